//! Cached privilege credentials.
//!
//! A build may call `sudo` from an install step. Dropping any cached sudo
//! timestamp before the build starts forces such a call to prompt again
//! instead of silently running with elevated rights.

use tokio::process::Command;
use tracing::{debug, warn};

/// Something holding an elevated credential that can be revoked.
pub trait CredentialCache {
  /// Drop any cached credential. Failures are logged, never returned.
  fn invalidate(&self) -> impl Future<Output = ()>;
}

/// Revokes the sudo timestamp with `sudo -k`.
#[derive(Debug, Clone)]
pub struct SudoCredentials {
  pub sudo: String,
}

impl Default for SudoCredentials {
  fn default() -> Self {
    Self {
      sudo: "/usr/bin/sudo".to_string(),
    }
  }
}

impl CredentialCache for SudoCredentials {
  async fn invalidate(&self) {
    debug!(sudo = %self.sudo, "invalidating cached sudo credentials");

    match Command::new(&self.sudo).arg("-k").status().await {
      Ok(status) if status.success() => {}
      Ok(status) => warn!(code = ?status.code(), "sudo -k exited unsuccessfully"),
      Err(e) => debug!(error = %e, "sudo unavailable, nothing to invalidate"),
    }
  }
}
