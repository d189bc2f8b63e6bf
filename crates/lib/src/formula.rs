//! Formula definitions.
//!
//! A [`Formula`] is everything the build child needs from a package
//! definition: its dependencies, requirements, compiler incompatibilities,
//! install prefix and install procedure. [`JsonFormula`] reads one from a JSON
//! file:
//!
//! ```json
//! {
//!   "name": "wget",
//!   "version": "1.21.4",
//!   "dependencies": [{ "name": "openssl", "keg_only": true }],
//!   "fails_with": [{ "compiler": "llvm-gcc", "reason": "segfaults in configure" }],
//!   "install": ["./configure --prefix=$KEGBUILD_PREFIX", "make install"]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::build::cmd::execute_cmd;
use crate::build::{BuildError, InstallContext};
use crate::compiler::FailsWith;
use crate::deps::Dependency;
use crate::env::BuildEnv;
use crate::platform::paths::KegPaths;

/// The package-definition side of a build attempt.
pub trait Formula {
  fn name(&self) -> &str;

  /// Versioned directory the install procedure writes into.
  fn prefix(&self) -> &Path;

  fn requirements(&self) -> &[Requirement];

  /// Recursive dependencies in graph order. May contain duplicates.
  fn recursive_dependencies(&self) -> Vec<Dependency>;

  fn fails_with(&self) -> &[FailsWith];

  /// Run the install procedure. The prefix already exists.
  fn install(&self, ctx: &InstallContext<'_>) -> impl Future<Output = Result<(), BuildError>>;
}

/// A non-formula precondition that adjusts the build environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
  pub name: String,
  /// Variables set for the build when this requirement is in effect.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

impl Requirement {
  pub fn modify_build_environment(&self, env: &mut BuildEnv) {
    for (key, value) in &self.env {
      debug!(requirement = %self.name, key = %key, "requirement sets variable");
      env.set(key, value.clone());
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDef {
  pub name: String,
  #[serde(default)]
  pub keg_only: bool,
  /// Overrides `<root>/opt/<name>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub opt_prefix: Option<PathBuf>,
}

/// On-disk shape of a formula file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaDef {
  pub name: String,
  #[serde(default = "default_version")]
  pub version: String,
  /// Overrides `<root>/Cellar/<name>/<version>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prefix: Option<PathBuf>,
  #[serde(default)]
  pub dependencies: Vec<DependencyDef>,
  #[serde(default)]
  pub requirements: Vec<Requirement>,
  #[serde(default)]
  pub fails_with: Vec<FailsWith>,
  #[serde(default)]
  pub install: Vec<String>,
}

fn default_version() -> String {
  "HEAD".to_string()
}

#[derive(Debug, Error)]
pub enum FormulaError {
  #[error("failed to read formula {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse formula {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("formula name must not be empty")]
  EmptyName,
}

/// A formula loaded from a JSON file, with paths resolved against an installation root.
#[derive(Debug, Clone)]
pub struct JsonFormula {
  def: FormulaDef,
  prefix: PathBuf,
  dependencies: Vec<Dependency>,
}

impl JsonFormula {
  pub fn from_def(def: FormulaDef, paths: &KegPaths) -> Result<Self, FormulaError> {
    if def.name.trim().is_empty() {
      return Err(FormulaError::EmptyName);
    }

    let prefix = def
      .prefix
      .clone()
      .unwrap_or_else(|| paths.keg_dir(&def.name, &def.version));

    let dependencies = def
      .dependencies
      .iter()
      .map(|dep| {
        let opt = dep.opt_prefix.clone().unwrap_or_else(|| paths.opt_dir(&dep.name));
        Dependency::new(dep.name.clone(), dep.keg_only, opt)
      })
      .collect();

    Ok(Self {
      def,
      prefix,
      dependencies,
    })
  }

  pub async fn load(path: &Path, paths: &KegPaths) -> Result<Self, FormulaError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|source| FormulaError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let def: FormulaDef = serde_json::from_str(&content).map_err(|source| FormulaError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_def(def, paths)
  }
}

impl Formula for JsonFormula {
  fn name(&self) -> &str {
    &self.def.name
  }

  fn prefix(&self) -> &Path {
    &self.prefix
  }

  fn requirements(&self) -> &[Requirement] {
    &self.def.requirements
  }

  fn recursive_dependencies(&self) -> Vec<Dependency> {
    self.dependencies.clone()
  }

  fn fails_with(&self) -> &[FailsWith] {
    &self.def.fails_with
  }

  async fn install(&self, ctx: &InstallContext<'_>) -> Result<(), BuildError> {
    for (idx, cmd) in self.def.install.iter().enumerate() {
      debug!(step = idx, "running install step");
      execute_cmd(cmd, ctx).await?;
    }
    Ok(())
  }
}
