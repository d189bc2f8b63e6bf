//! Implementation of the `kegbuild install` command.
//!
//! Runs `kegbuild build` as a child process with an error pipe and presents
//! whatever failure the child reports.

use anyhow::Result;

use super::BuildArgs;

#[cfg(unix)]
pub fn cmd_install(args: &BuildArgs, verbose: bool) -> Result<()> {
  use anyhow::{Context, bail};
  use kegbuild_lib::output::{ohai, write_failure};
  use kegbuild_lib::supervise::supervise;
  use tokio::process::Command;

  let exe = std::env::current_exe().context("failed to locate the kegbuild executable")?;
  let mut command = Command::new(exe);
  if verbose {
    command.arg("--verbose");
  }
  command.arg("build").args(args.to_args());

  ohai(&format!("Building {}", args.formula.display()));

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;
  let build = rt.block_on(supervise(command)).context("build supervision failed")?;

  if let Some(record) = &build.failure {
    write_failure(&mut std::io::stderr().lock(), record)?;
    bail!("build of {} failed", args.formula.display());
  }
  if !build.status.success() {
    bail!("build process exited with {}", build.status);
  }

  Ok(())
}

#[cfg(not(unix))]
pub fn cmd_install(_args: &BuildArgs, _verbose: bool) -> Result<()> {
  anyhow::bail!("supervised builds need unix pipes; run `kegbuild build` directly")
}
