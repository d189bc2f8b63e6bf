//! Keg-only dependency injection.
//!
//! Keg-only dependencies are installed but not linked into the default search
//! paths, so a build has to be told where they live. Resolution walks the
//! recursive dependency list in graph order and records the search paths of
//! every keg-only dependency in the [`BuildEnv`]. Each dependency is prepended,
//! so the last one processed is searched first.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::env::{BuildEnv, EnvMode};

/// One resolved dependency of the formula being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
  pub name: String,
  pub keg_only: bool,
  /// Stable `opt` prefix of the installed dependency.
  pub opt_prefix: PathBuf,
}

impl Dependency {
  pub fn new(name: impl Into<String>, keg_only: bool, opt_prefix: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      keg_only,
      opt_prefix: opt_prefix.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum DependencyError {
  /// A keg-only dependency has no `opt` prefix, so it is missing or half installed.
  #[error("{} not present\nReinstall {name}. Sorry :(", opt.display())]
  MissingOptPrefix { name: String, opt: PathBuf },
}

/// Drop repeated dependencies, keeping the first occurrence of each name.
pub fn dedup(deps: impl IntoIterator<Item = Dependency>) -> Vec<Dependency> {
  let mut seen = HashSet::new();
  deps.into_iter().filter(|dep| seen.insert(dep.name.clone())).collect()
}

/// Record the environment mutations for every keg-only dependency.
///
/// `deps` must already be deduplicated and in graph order. Fails on the first
/// keg-only dependency whose opt prefix is not a directory.
pub fn resolve_dependencies(deps: &[Dependency], env: &mut BuildEnv) -> Result<(), DependencyError> {
  for dep in deps.iter().filter(|d| d.keg_only) {
    let opt = &dep.opt_prefix;

    if !opt.is_dir() {
      return Err(DependencyError::MissingOptPrefix {
        name: dep.name.clone(),
        opt: opt.clone(),
      });
    }

    info!(name = %dep.name, opt = ?opt, mode = %env.mode(), "injecting keg-only dependency");

    env.prepend_path("PATH", opt.join("bin"));
    env.prepend_path("PKG_CONFIG_PATH", opt.join("lib").join("pkgconfig"));
    env.prepend_path("PKG_CONFIG_PATH", opt.join("share").join("pkgconfig"));
    env.prepend_path("CMAKE_PREFIX_PATH", opt);

    match env.mode() {
      EnvMode::Isolated => env.prepend_dep_prefix(dep.name.clone(), opt),
      EnvMode::Merged => {
        let lib = opt.join("lib");
        let include = opt.join("include");
        if lib.is_dir() {
          env.prepend("LDFLAGS", format!("-L{}", lib.display()));
        } else {
          debug!(name = %dep.name, "no lib directory, skipping -L");
        }
        if include.is_dir() {
          env.prepend("CPPFLAGS", format!("-I{}", include.display()));
        } else {
          debug!(name = %dep.name, "no include directory, skipping -I");
        }
        env.prepend_path("ACLOCAL_PATH", opt.join("share").join("aclocal"));
      }
    }
  }

  Ok(())
}
