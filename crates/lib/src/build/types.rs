use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::env::BuildEnv;

/// Errors raised while running a build procedure.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A build command exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// A build command could not be started.
  #[error("failed to spawn {shell}: {source}")]
  Spawn {
    shell: String,
    #[source]
    source: std::io::Error,
  },

  /// The install prefix could not be created.
  #[error("failed to create install prefix {}: {source}", path.display())]
  CreatePrefix {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// I/O error during the build.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Per-attempt options chosen by the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
  /// Initialize a git repository in the working directory before building.
  pub track_changes: bool,
  /// Hand the working directory to an interactive shell instead of installing.
  pub interactive: bool,
}

/// Where the executor is in a build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
  Idle,
  EnvironmentReady,
  InteractiveSuspended,
  Installing,
  MetadataCopied,
  Done,
  Failed,
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BuildState::Idle => "idle",
      BuildState::EnvironmentReady => "environment-ready",
      BuildState::InteractiveSuspended => "interactive-suspended",
      BuildState::Installing => "installing",
      BuildState::MetadataCopied => "metadata-copied",
      BuildState::Done => "done",
      BuildState::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// How a successful attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
  /// The operator ran an interactive session; nothing was installed.
  Interactive,
  /// The install procedure ran and metadata files were copied.
  Installed {
    prefix: PathBuf,
    /// Names of the metadata files that made it into the prefix.
    metadata_files: Vec<String>,
  },
}

/// What a formula's install procedure gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct InstallContext<'a> {
  pub env: &'a BuildEnv,
  pub workdir: &'a Path,
  pub prefix: &'a Path,
  /// Shell override for build commands.
  pub shell: Option<&'a str>,
}
