//! Build configuration read from the process environment.
//!
//! The parent passes its decisions to the build child through variables:
//!
//! | Variable           | Meaning                                   | Default                  |
//! |--------------------|-------------------------------------------|--------------------------|
//! | `KEGBUILD_ROOT`    | installation root                         | `/usr/local`             |
//! | `KEGBUILD_ENV_MODE`| `isolated` or `merged` environment        | `isolated`               |
//! | `KEGBUILD_CC`      | active compiler (`clang`, `gcc`, `llvm-gcc`) | platform default      |
//! | `KEGBUILD_CC_BUILD`| vendor build number of that compiler      | unset                    |
//! | `KEGBUILD_SHELL`   | shell for install steps                   | `/bin/sh`                |

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::compiler::{CompilerDescriptor, CompilerFamily, UnknownCompiler};
use crate::env::{EnvMode, UnknownEnvMode};
use crate::platform::os::Os;
use crate::platform::paths::{KegPaths, root_dir};

pub const ENV_MODE_ENV: &str = "KEGBUILD_ENV_MODE";
pub const COMPILER_ENV: &str = "KEGBUILD_CC";
pub const COMPILER_BUILD_ENV: &str = "KEGBUILD_CC_BUILD";
pub const SHELL_ENV: &str = "KEGBUILD_SHELL";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid KEGBUILD_ENV_MODE: {0}")]
  EnvMode(#[from] UnknownEnvMode),

  #[error("invalid KEGBUILD_CC: {0}")]
  Compiler(#[from] UnknownCompiler),

  #[error("invalid KEGBUILD_CC_BUILD '{0}': expected a build number")]
  CompilerBuild(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
  pub root: PathBuf,
  pub env_mode: EnvMode,
  pub compiler: CompilerDescriptor,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shell: Option<String>,
}

impl BuildConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let env_mode = match non_empty(ENV_MODE_ENV) {
      Some(value) => value.parse()?,
      None => EnvMode::default(),
    };

    let family = match non_empty(COMPILER_ENV) {
      Some(value) => value.parse()?,
      None => default_compiler(),
    };

    let build = non_empty(COMPILER_BUILD_ENV)
      .map(|value| value.trim().parse::<u32>().map_err(|_| ConfigError::CompilerBuild(value)))
      .transpose()?;

    Ok(Self {
      root: root_dir(),
      env_mode,
      compiler: CompilerDescriptor { family, build },
      shell: non_empty(SHELL_ENV),
    })
  }

  pub fn paths(&self) -> KegPaths {
    KegPaths::new(&self.root)
  }
}

fn non_empty(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_compiler() -> CompilerFamily {
  Os::current()
    .map(|os| os.default_compiler())
    .unwrap_or(CompilerFamily::Clang)
}
