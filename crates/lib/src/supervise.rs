//! Parent side of the build handoff.
//!
//! The parent creates a pipe, gives the build child the write end through
//! `KEGBUILD_ERROR_PIPE`, then reads the read end to end-of-stream. An empty
//! stream means the child reported nothing; otherwise it holds one
//! [`FailureRecord`].

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::process::ExitStatus;

use rustix::io::{FdFlags, fcntl_getfd, fcntl_setfd};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::channel::{ChannelError, read_failure};
use crate::consts::ERROR_PIPE_ENV;
use crate::failure::FailureRecord;

#[derive(Debug, Error)]
pub enum SuperviseError {
  #[error("failed to create error pipe: {0}")]
  Pipe(#[source] io::Error),

  #[error("failed to spawn build process: {0}")]
  Spawn(#[source] io::Error),

  #[error("failed to wait for build process: {0}")]
  Wait(#[source] io::Error),

  #[error(transparent)]
  Channel(#[from] ChannelError),

  #[error("error pipe reader stopped: {0}")]
  Reader(#[from] tokio::task::JoinError),
}

/// How a supervised build ended.
#[derive(Debug)]
pub struct SupervisedBuild {
  pub status: ExitStatus,
  /// The record the child reported, if any.
  pub failure: Option<FailureRecord>,
}

impl SupervisedBuild {
  pub fn succeeded(&self) -> bool {
    self.status.success() && self.failure.is_none()
  }
}

/// Spawn `command` as a build child and collect its report.
pub async fn supervise(mut command: Command) -> Result<SupervisedBuild, SuperviseError> {
  let (read_end, write_end) = error_pipe().map_err(SuperviseError::Pipe)?;
  let fd = write_end.as_raw_fd();

  command.env(ERROR_PIPE_ENV, fd.to_string());
  // SAFETY: runs between fork and exec and only calls fcntl, which is
  // async-signal-safe. `fd` stays open until after spawn returns.
  unsafe {
    command.pre_exec(move || {
      let fd = BorrowedFd::borrow_raw(fd);
      fcntl_setfd(fd, FdFlags::empty())?;
      Ok(())
    });
  }
  let mut child = command.spawn().map_err(SuperviseError::Spawn)?;
  debug!(pid = ?child.id(), fd = write_end.as_raw_fd(), "build child spawned");

  // Only the child may hold the write end, or end-of-stream never arrives.
  drop(write_end);

  let reader = tokio::task::spawn_blocking(move || read_failure(std::fs::File::from(read_end)));
  let status = child.wait().await.map_err(SuperviseError::Wait)?;
  let failure = reader.await??;

  info!(code = ?status.code(), reported = failure.is_some(), "build child exited");
  Ok(SupervisedBuild { status, failure })
}

/// A pipe with both ends close-on-exec.
///
/// The write end is made inheritable only inside the build child, so no
/// other process spawned concurrently by this one can hold it open.
fn error_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
  let (read_end, write_end) = rustix::pipe::pipe()?;

  for end in [&read_end, &write_end] {
    let flags = fcntl_getfd(end)?;
    fcntl_setfd(end, flags | FdFlags::CLOEXEC)?;
  }

  Ok((read_end, write_end))
}
