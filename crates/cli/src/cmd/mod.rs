mod build;
mod info;
mod install;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Args;
use kegbuild_lib::build::BuildOptions;

pub use build::cmd_build;
pub use info::cmd_info;
pub use install::cmd_install;

/// Arguments shared by `build` and `install`.
#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
  /// Path to the formula file (JSON)
  pub formula: PathBuf,

  /// Directory holding the unpacked sources (default: current directory)
  #[arg(short = 'C', long)]
  pub workdir: Option<PathBuf>,

  /// Open a shell in the source directory instead of installing
  #[arg(short, long)]
  pub interactive: bool,

  /// Record the sources in a git repository before building
  #[arg(long)]
  pub git: bool,
}

impl BuildArgs {
  pub fn options(&self) -> BuildOptions {
    BuildOptions {
      track_changes: self.git,
      interactive: self.interactive,
    }
  }

  /// Arguments that reproduce these options on a `build` command line.
  pub fn to_args(&self) -> Vec<OsString> {
    let mut args = vec![self.formula.clone().into_os_string()];
    if let Some(workdir) = &self.workdir {
      args.push("--workdir".into());
      args.push(workdir.clone().into_os_string());
    }
    if self.interactive {
      args.push("--interactive".into());
    }
    if self.git {
      args.push("--git".into());
    }
    args
  }
}
