//! Single build attempt execution.
//!
//! The executor walks one attempt through its states:
//!
//! ```text
//! Idle -> EnvironmentReady -> InteractiveSuspended -> Done
//!                          -> Installing -> MetadataCopied -> Done
//!                          -> Failed
//! ```
//!
//! Only the install path can fail. Change tracking and the interactive shell
//! are best effort.

use std::path::Path;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::build::cmd::interactive_shell;
use crate::build::metadata::install_metadata_files;
use crate::build::snapshot::init_snapshot;
use crate::build::types::{BuildError, BuildOptions, BuildOutcome, BuildState, InstallContext};
use crate::consts::META_FILES;
use crate::env::BuildEnv;
use crate::formula::Formula;
use crate::output::{ohai, print_warning};

pub struct BuildExecutor<'a> {
  env: &'a BuildEnv,
  workdir: &'a Path,
  options: BuildOptions,
  shell: Option<&'a str>,
  interactive_shell: Option<String>,
  git: String,
  state: BuildState,
}

impl<'a> BuildExecutor<'a> {
  pub fn new(env: &'a BuildEnv, workdir: &'a Path, options: BuildOptions) -> Self {
    Self {
      env,
      workdir,
      options,
      shell: None,
      interactive_shell: None,
      git: "git".to_string(),
      state: BuildState::Idle,
    }
  }

  /// Shell used for install steps instead of `/bin/sh`.
  pub fn with_shell(mut self, shell: Option<&'a str>) -> Self {
    self.shell = shell;
    self
  }

  /// Shell handed to the operator in interactive mode instead of `$SHELL`.
  pub fn with_interactive_shell(mut self, shell: impl Into<String>) -> Self {
    self.interactive_shell = Some(shell.into());
    self
  }

  /// git binary used for change tracking.
  pub fn with_git(mut self, git: impl Into<String>) -> Self {
    self.git = git.into();
    self
  }

  pub fn state(&self) -> BuildState {
    self.state
  }

  fn transition(&mut self, next: BuildState) {
    debug!(from = %self.state, to = %next, "build state");
    self.state = next;
  }

  /// Run the attempt to completion.
  pub async fn run<F: Formula>(&mut self, formula: &F) -> Result<BuildOutcome, BuildError> {
    self.transition(BuildState::EnvironmentReady);

    if self.options.track_changes
      && let Err(e) = init_snapshot(self.workdir, &self.git).await
    {
      warn!(error = %e, "change tracking unavailable");
      print_warning(&format!("Could not track changes: {}", e));
    }

    if self.options.interactive {
      self.transition(BuildState::InteractiveSuspended);
      self.interactive(formula.prefix()).await;
      self.transition(BuildState::Done);
      return Ok(BuildOutcome::Interactive);
    }

    match self.install(formula).await {
      Ok(outcome) => {
        self.transition(BuildState::Done);
        Ok(outcome)
      }
      Err(e) => {
        self.transition(BuildState::Failed);
        Err(e)
      }
    }
  }

  async fn install<F: Formula>(&mut self, formula: &F) -> Result<BuildOutcome, BuildError> {
    self.transition(BuildState::Installing);

    let prefix = formula.prefix();
    fs::create_dir_all(prefix)
      .await
      .map_err(|source| BuildError::CreatePrefix {
        path: prefix.to_path_buf(),
        source,
      })?;

    let ctx = InstallContext {
      env: self.env,
      workdir: self.workdir,
      prefix,
      shell: self.shell,
    };
    formula.install(&ctx).await?;

    let metadata_files = install_metadata_files(self.workdir, prefix, META_FILES).await;
    self.transition(BuildState::MetadataCopied);

    info!(name = %formula.name(), prefix = ?prefix, "install complete");

    Ok(BuildOutcome::Installed {
      prefix: prefix.to_path_buf(),
      metadata_files,
    })
  }

  async fn interactive(&self, prefix: &Path) {
    ohai("Entering interactive mode");
    println!("Type `exit' to return; nothing will be installed");
    println!("Install to this prefix: {}", prefix.display());

    if self.options.track_changes {
      println!("This directory is now a git repo. Make your changes and then use:");
      println!("  git diff > changes.patch");
      println!("to save the diff.");
    }

    let ambient = std::env::var("SHELL").ok();
    let shell = match &self.interactive_shell {
      Some(shell) => shell.as_str(),
      None => interactive_shell(ambient.as_deref()),
    };

    let mut command = Command::new(shell);
    command.current_dir(self.workdir);
    self.env.apply(&mut command);

    match command.status().await {
      Ok(status) => debug!(code = ?status.code(), "interactive shell exited"),
      Err(e) => {
        warn!(shell, error = %e, "failed to start interactive shell");
        print_warning(&format!("Could not start {}: {}", shell, e));
      }
    }
  }
}
