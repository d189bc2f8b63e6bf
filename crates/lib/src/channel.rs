//! The single exit path of a build child.
//!
//! Every build attempt ends in exactly one [`Termination`]:
//!
//! - success: exit 0, the error pipe (if any) is closed unused
//! - failure with an error pipe: the [`FailureRecord`] is written to the pipe,
//!   the pipe is closed, exit 1
//! - failure without an error pipe: the failure is printed to stderr, exit 2
//!
//! The error pipe is inherited from the parent and named by
//! `KEGBUILD_ERROR_PIPE`. It is marked close-on-exec as soon as it is opened, so
//! nothing the build spawns keeps the write end alive. The parent therefore sees
//! end-of-stream as soon as this process exits, even if a build step leaves a
//! daemon running.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{
  ERROR_PIPE_ENV, EXIT_COMPLETED, EXIT_REPORTED_LOCALLY, EXIT_REPORTED_TO_PARENT, FAILURE_SCHEMA_VERSION,
};
use crate::failure::FailureRecord;
use crate::output::write_failure;

#[derive(Debug, Error)]
pub enum ChannelError {
  #[error("KEGBUILD_ERROR_PIPE is not a usable file descriptor number: '{0}'")]
  InvalidDescriptor(String),

  #[error("KEGBUILD_ERROR_PIPE={fd} does not name an open descriptor: {source}")]
  ClosedDescriptor {
    fd: i32,
    #[source]
    source: io::Error,
  },

  #[error("failed to mark error pipe close-on-exec: {0}")]
  CloseOnExec(#[source] io::Error),

  #[error("failed to write failure record: {0}")]
  Write(#[source] io::Error),

  #[error("failed to read failure record: {0}")]
  Read(#[source] io::Error),

  #[error("malformed failure record: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error("unsupported failure record version {found} (expected {expected})")]
  UnsupportedVersion { found: u64, expected: u32 },
}

/// Write end of the pipe inherited from the parent.
#[derive(Debug)]
pub struct ErrorPipe {
  file: std::fs::File,
}

impl ErrorPipe {
  /// Open the pipe named by `KEGBUILD_ERROR_PIPE`, if set.
  #[cfg(unix)]
  pub fn from_env() -> Result<Option<Self>, ChannelError> {
    use std::os::fd::{BorrowedFd, FromRawFd, OwnedFd};

    let Ok(value) = std::env::var(ERROR_PIPE_ENV) else {
      return Ok(None);
    };

    let fd: i32 = value
      .trim()
      .parse()
      .ok()
      .filter(|fd| *fd > 2)
      .ok_or_else(|| ChannelError::InvalidDescriptor(value.clone()))?;

    // SAFETY: fd is above the standard streams and only borrowed for the duration of the
    // fcntl call, which fails with EBADF rather than misbehaving if it is closed.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    rustix::io::fcntl_getfd(borrowed).map_err(|e| ChannelError::ClosedDescriptor {
      fd,
      source: io::Error::from_raw_os_error(e.raw_os_error()),
    })?;

    // SAFETY: the descriptor is open (checked above) and was handed to this
    // process by the parent for its exclusive use. Nothing else owns it.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    debug!(fd, "opened error pipe");
    Self::from_fd(owned).map(Some)
  }

  #[cfg(not(unix))]
  pub fn from_env() -> Result<Option<Self>, ChannelError> {
    if std::env::var_os(ERROR_PIPE_ENV).is_some() {
      warn!("{} is only supported on unix, reporting locally", ERROR_PIPE_ENV);
    }
    Ok(None)
  }

  /// Take ownership of a descriptor and mark it close-on-exec.
  #[cfg(unix)]
  pub fn from_fd(fd: std::os::fd::OwnedFd) -> Result<Self, ChannelError> {
    use rustix::io::{FdFlags, fcntl_getfd, fcntl_setfd};

    let to_io = |e: rustix::io::Errno| io::Error::from_raw_os_error(e.raw_os_error());
    let flags = fcntl_getfd(&fd).map_err(|e| ChannelError::CloseOnExec(to_io(e)))?;
    fcntl_setfd(&fd, flags | FdFlags::CLOEXEC).map_err(|e| ChannelError::CloseOnExec(to_io(e)))?;

    Ok(Self {
      file: std::fs::File::from(fd),
    })
  }
}

impl Write for ErrorPipe {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.file.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.file.flush()
  }
}

/// How the process ends. Each variant maps to a fixed exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
  Completed,
  ReportedToParent,
  ReportedLocally,
}

impl Termination {
  pub fn code(&self) -> i32 {
    match self {
      Termination::Completed => EXIT_COMPLETED,
      Termination::ReportedToParent => EXIT_REPORTED_TO_PARENT,
      Termination::ReportedLocally => EXIT_REPORTED_LOCALLY,
    }
  }

  /// Flush standard streams and exit immediately.
  ///
  /// `process::exit` runs no destructors for live frames, so nothing on the
  /// way out can re-enter failure handling.
  pub fn exit(self) -> ! {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    std::process::exit(self.code())
  }
}

/// Delivers the outcome of a build attempt. Consumed by the one call to `deliver`.
#[derive(Debug)]
pub struct FailureChannel<P = ErrorPipe> {
  pipe: Option<P>,
}

impl<P: Write> FailureChannel<P> {
  pub fn new(pipe: Option<P>) -> Self {
    Self { pipe }
  }

  pub fn has_pipe(&self) -> bool {
    self.pipe.is_some()
  }

  /// Report `result`, printing local failures to stderr.
  pub fn deliver(self, result: Result<(), FailureRecord>) -> Termination {
    let stderr = io::stderr();
    let mut local = stderr.lock();
    self.deliver_to(result, &mut local)
  }

  /// Report `result`, printing local failures to `local`.
  pub fn deliver_to(self, result: Result<(), FailureRecord>, local: &mut impl Write) -> Termination {
    match (result, self.pipe) {
      (Ok(()), pipe) => {
        drop(pipe);
        Termination::Completed
      }
      (Err(record), Some(mut pipe)) => {
        if let Err(e) = write_record(&mut pipe, &record) {
          warn!(error = %e, "could not report failure to parent, printing it instead");
          let _ = write_failure(local, &record);
        }
        drop(pipe);
        debug!(kind = ?record.kind, "failure reported to parent");
        Termination::ReportedToParent
      }
      (Err(record), None) => {
        let _ = write_failure(local, &record);
        Termination::ReportedLocally
      }
    }
  }
}

/// Serialize one record and flush it.
pub fn write_record(out: &mut impl Write, record: &FailureRecord) -> Result<(), ChannelError> {
  serde_json::to_writer(&mut *out, record).map_err(|e| ChannelError::Write(io::Error::other(e)))?;
  out.flush().map_err(ChannelError::Write)
}

/// Parent side: read the pipe to end-of-stream and decode what the child sent.
///
/// An empty stream means the child reported no failure.
pub fn read_failure(mut reader: impl Read) -> Result<Option<FailureRecord>, ChannelError> {
  let mut buf = Vec::new();
  reader.read_to_end(&mut buf).map_err(ChannelError::Read)?;

  if buf.iter().all(u8::is_ascii_whitespace) {
    return Ok(None);
  }

  let value: serde_json::Value = serde_json::from_slice(&buf)?;
  let found = value.get("version").and_then(serde_json::Value::as_u64).unwrap_or(0);
  if found != u64::from(FAILURE_SCHEMA_VERSION) {
    return Err(ChannelError::UnsupportedVersion {
      found,
      expected: FAILURE_SCHEMA_VERSION,
    });
  }

  Ok(Some(serde_json::from_value(value)?))
}
