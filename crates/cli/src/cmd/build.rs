//! Implementation of the `kegbuild build` command.
//!
//! This is the build child. It never returns: the process exits with the
//! status chosen by the failure channel.

use anyhow::{Context, Result};

use kegbuild_lib::bootstrap::{self, BuildRequest};
use kegbuild_lib::config::BuildConfig;

use super::BuildArgs;

pub fn cmd_build(args: &BuildArgs) -> ! {
  bootstrap::run(request(args)).exit()
}

fn request(args: &BuildArgs) -> Result<BuildRequest> {
  let workdir = match &args.workdir {
    Some(dir) => dir.clone(),
    None => std::env::current_dir().context("failed to determine working directory")?,
  };
  let config = BuildConfig::from_env()?;

  Ok(BuildRequest {
    formula: args.formula.clone(),
    workdir,
    config,
    options: args.options(),
  })
}
