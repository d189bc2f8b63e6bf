//! Git snapshot of the working directory.
//!
//! With change tracking on, the unpacked sources are committed to the index
//! before the build touches them, so `git diff` later shows exactly what the
//! operator (or the build) changed.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("failed to run git {step}: {source}")]
  Spawn {
    step: &'static str,
    #[source]
    source: std::io::Error,
  },

  #[error("git {step} exited with code {code:?}")]
  Failed { step: &'static str, code: Option<i32> },
}

/// Initialize a repository in `workdir` and stage every file.
pub async fn init_snapshot(workdir: &Path, git: &str) -> Result<(), SnapshotError> {
  info!(workdir = ?workdir, "initializing change tracking repository");

  run_git(workdir, git, "init", &["init", "--quiet"]).await?;
  run_git(workdir, git, "add", &["add", "-A"]).await?;

  Ok(())
}

async fn run_git(workdir: &Path, git: &str, step: &'static str, args: &[&str]) -> Result<(), SnapshotError> {
  debug!(step, "running git");

  let status = Command::new(git)
    .args(args)
    .current_dir(workdir)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .status()
    .await
    .map_err(|source| SnapshotError::Spawn { step, source })?;

  if !status.success() {
    return Err(SnapshotError::Failed {
      step,
      code: status.code(),
    });
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn missing_git_reports_the_step() {
    let temp = TempDir::new().unwrap();

    let err = init_snapshot(temp.path(), "/nonexistent/git").await.unwrap_err();

    assert!(matches!(err, SnapshotError::Spawn { step: "init", .. }));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn failing_git_reports_exit_code() {
    let temp = TempDir::new().unwrap();

    let err = init_snapshot(temp.path(), "/bin/false").await.unwrap_err();

    assert!(matches!(err, SnapshotError::Failed { step: "init", code: Some(1) }));
  }
}
