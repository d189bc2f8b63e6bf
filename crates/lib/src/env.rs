//! Build environment record.
//!
//! Dependency resolution, requirements and the compiler gate never touch the
//! process environment. They record their mutations in a [`BuildEnv`], which
//! is handed to the executor and applied to each spawned command.
//!
//! Two modes decide how the record reaches a command:
//!
//! - **Isolated**: the command starts from an empty environment and gets a
//!   minimal toolchain environment built from the record. Compiler and linker
//!   flags for keg-only dependencies are derived here from the opt prefixes
//!   recorded alongside the names in `KEGBUILD_DEP_PREFIXES`.
//! - **Merged**: the command inherits the ambient environment and every
//!   recorded variable is prepended to the inherited value.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::consts::{DEP_PREFIXES_ENV, ERROR_PIPE_ENV, SOURCE_DATE_EPOCH};

/// Search path used in isolated mode after any recorded `PATH` segments.
pub const SYSTEM_PATH: &str = "/usr/bin:/bin:/usr/sbin:/sbin";

/// Ambient variables an isolated build still receives unchanged.
const PASSTHROUGH_VARS: &[&str] = &["HOME", "TERM", "USER", "LOGNAME", "TMPDIR", "SHELL"];

/// How recorded mutations are surfaced to build commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
  #[default]
  Isolated,
  Merged,
}

impl EnvMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      EnvMode::Isolated => "isolated",
      EnvMode::Merged => "merged",
    }
  }
}

impl fmt::Display for EnvMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment mode '{0}' (expected 'isolated' or 'merged')")]
pub struct UnknownEnvMode(pub String);

impl FromStr for EnvMode {
  type Err = UnknownEnvMode;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "isolated" | "superenv" => Ok(EnvMode::Isolated),
      "merged" | "std" | "stdenv" => Ok(EnvMode::Merged),
      _ => Err(UnknownEnvMode(s.to_string())),
    }
  }
}

/// How the segments of one variable are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
  /// `:` joined search path.
  Path,
  /// Space joined flags or words.
  Space,
}

impl Separator {
  pub fn as_str(&self) -> &'static str {
    match self {
      Separator::Path => ":",
      Separator::Space => " ",
    }
  }
}

/// Segments recorded for a single variable, highest precedence first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
  pub separator: Separator,
  pub segments: Vec<String>,
}

impl EnvVar {
  pub fn joined(&self) -> String {
    self.segments.join(self.separator.as_str())
  }
}

/// The full set of environment mutations for one build attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
  mode: EnvMode,
  vars: BTreeMap<String, EnvVar>,
  assignments: BTreeMap<String, String>,
  /// Opt prefixes of keg-only dependencies in isolated mode, highest precedence first.
  dep_prefixes: Vec<PathBuf>,
}

/// A materialized environment ready to hand to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnv {
  /// Start from an empty environment before applying `vars`.
  pub clear: bool,
  pub vars: BTreeMap<String, String>,
}

impl BuildEnv {
  pub fn new(mode: EnvMode) -> Self {
    Self {
      mode,
      ..Default::default()
    }
  }

  pub fn mode(&self) -> EnvMode {
    self.mode
  }

  /// Prepend a `:` separated search path segment.
  pub fn prepend_path(&mut self, key: &str, value: impl AsRef<Path>) {
    self.prepend_with(key, value.as_ref().to_string_lossy().into_owned(), Separator::Path);
  }

  /// Prepend a space separated word (flags, names).
  pub fn prepend(&mut self, key: &str, value: impl Into<String>) {
    self.prepend_with(key, value.into(), Separator::Space);
  }

  fn prepend_with(&mut self, key: &str, value: String, separator: Separator) {
    let var = self.vars.entry(key.to_string()).or_insert_with(|| EnvVar {
      separator,
      segments: Vec::new(),
    });
    var.segments.insert(0, value);
  }

  /// Record a plain assignment that overrides whatever the command would inherit.
  pub fn set(&mut self, key: &str, value: impl Into<String>) {
    self.assignments.insert(key.to_string(), value.into());
  }

  /// Recorded segments for `key`, highest precedence first.
  pub fn segments(&self, key: &str) -> &[String] {
    self.vars.get(key).map(|v| v.segments.as_slice()).unwrap_or(&[])
  }

  /// Joined value of a recorded variable or assignment.
  pub fn get(&self, key: &str) -> Option<String> {
    if let Some(value) = self.assignments.get(key) {
      return Some(value.clone());
    }
    self.vars.get(key).map(EnvVar::joined)
  }

  /// Record a keg-only dependency for the isolated environment.
  ///
  /// The name goes into the `KEGBUILD_DEP_PREFIXES` hint; `opt` is what the
  /// compiler and linker flags are built from.
  pub fn prepend_dep_prefix(&mut self, name: impl Into<String>, opt: impl Into<PathBuf>) {
    self.prepend(DEP_PREFIXES_ENV, name);
    self.dep_prefixes.insert(0, opt.into());
  }

  /// Dependency names recorded for the isolated environment, highest precedence first.
  pub fn dep_hints(&self) -> &[String] {
    self.segments(DEP_PREFIXES_ENV)
  }

  /// Opt prefixes matching [`BuildEnv::dep_hints`], in the same order.
  pub fn dep_prefixes(&self) -> &[PathBuf] {
    &self.dep_prefixes
  }

  /// Turn the record into concrete variables given the ambient environment.
  pub fn materialize(&self, ambient: &HashMap<String, String>) -> ResolvedEnv {
    match self.mode {
      EnvMode::Isolated => self.materialize_isolated(ambient),
      EnvMode::Merged => self.materialize_merged(ambient),
    }
  }

  fn materialize_isolated(&self, ambient: &HashMap<String, String>) -> ResolvedEnv {
    let mut vars = BTreeMap::new();

    for key in PASSTHROUGH_VARS {
      if let Some(value) = ambient.get(*key) {
        vars.insert(key.to_string(), value.clone());
      }
    }

    vars.insert("LANG".to_string(), "C".to_string());
    vars.insert("LC_ALL".to_string(), "C".to_string());
    vars.insert("SOURCE_DATE_EPOCH".to_string(), SOURCE_DATE_EPOCH.to_string());

    for (key, var) in &self.vars {
      vars.insert(key.clone(), var.joined());
    }

    let path = match self.vars.get("PATH") {
      Some(var) if !var.segments.is_empty() => format!("{}:{}", var.joined(), SYSTEM_PATH),
      _ => SYSTEM_PATH.to_string(),
    };
    vars.insert("PATH".to_string(), path);

    let mut cppflags = Vec::new();
    let mut ldflags = Vec::new();
    for opt in &self.dep_prefixes {
      let include = opt.join("include");
      let lib = opt.join("lib");
      if include.is_dir() {
        cppflags.push(format!("-I{}", include.display()));
      }
      if lib.is_dir() {
        ldflags.push(format!("-L{}", lib.display()));
      }
    }
    if !cppflags.is_empty() {
      vars.insert("CPPFLAGS".to_string(), cppflags.join(" "));
    }
    if !ldflags.is_empty() {
      vars.insert("LDFLAGS".to_string(), ldflags.join(" "));
    }

    for (key, value) in &self.assignments {
      vars.insert(key.clone(), value.clone());
    }

    ResolvedEnv { clear: true, vars }
  }

  fn materialize_merged(&self, ambient: &HashMap<String, String>) -> ResolvedEnv {
    let mut vars = BTreeMap::new();

    for (key, var) in &self.vars {
      let value = match ambient.get(key) {
        Some(existing) if !existing.is_empty() => {
          format!("{}{}{}", var.joined(), var.separator.as_str(), existing)
        }
        _ => var.joined(),
      };
      vars.insert(key.clone(), value);
    }

    for (key, value) in &self.assignments {
      vars.insert(key.clone(), value.clone());
    }

    ResolvedEnv { clear: false, vars }
  }

  /// Apply the record to a command using the current process environment as ambient.
  pub fn apply(&self, command: &mut Command) {
    let ambient: HashMap<String, String> = std::env::vars().collect();
    self.materialize(&ambient).apply(command);
  }
}

impl ResolvedEnv {
  pub fn apply(&self, command: &mut Command) {
    if self.clear {
      command.env_clear();
    } else {
      // The error pipe is close-on-exec, so its number is stale in any child.
      command.env_remove(ERROR_PIPE_ENV);
    }
    debug!(clear = self.clear, vars = self.vars.len(), "applying build environment");
    command.envs(&self.vars);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn ambient(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn prepend_puts_latest_first() {
    let mut env = BuildEnv::new(EnvMode::Merged);
    env.prepend_path("PATH", "/a/bin");
    env.prepend_path("PATH", "/b/bin");

    assert_eq!(env.segments("PATH"), ["/b/bin", "/a/bin"]);
    assert_eq!(env.get("PATH").unwrap(), "/b/bin:/a/bin");
  }

  #[test]
  fn space_separated_values_join_with_spaces() {
    let mut env = BuildEnv::new(EnvMode::Merged);
    env.prepend("LDFLAGS", "-L/a/lib");
    env.prepend("LDFLAGS", "-L/b/lib");

    assert_eq!(env.get("LDFLAGS").unwrap(), "-L/b/lib -L/a/lib");
  }

  #[test]
  fn assignment_wins_over_recorded_segments() {
    let mut env = BuildEnv::new(EnvMode::Merged);
    env.prepend("CC", "ignored");
    env.set("CC", "clang");

    assert_eq!(env.get("CC").unwrap(), "clang");
  }

  #[test]
  fn merged_mode_prepends_to_ambient_value() {
    let mut env = BuildEnv::new(EnvMode::Merged);
    env.prepend_path("PATH", "/opt/dep/bin");
    env.prepend("CPPFLAGS", "-I/opt/dep/include");

    let resolved = env.materialize(&ambient(&[("PATH", "/usr/bin"), ("CPPFLAGS", "-DNDEBUG")]));

    assert!(!resolved.clear);
    assert_eq!(resolved.vars["PATH"], "/opt/dep/bin:/usr/bin");
    assert_eq!(resolved.vars["CPPFLAGS"], "-I/opt/dep/include -DNDEBUG");
  }

  #[test]
  fn merged_mode_leaves_unrecorded_variables_alone() {
    let env = BuildEnv::new(EnvMode::Merged);
    let resolved = env.materialize(&ambient(&[("EDITOR", "vi")]));
    assert!(resolved.vars.is_empty());
  }

  #[test]
  fn isolated_mode_starts_from_a_minimal_environment() {
    let mut env = BuildEnv::new(EnvMode::Isolated);
    env.prepend_path("PATH", "/opt/dep/bin");

    let resolved = env.materialize(&ambient(&[("HOME", "/home/me"), ("EDITOR", "vi"), ("PATH", "/home/me/bin")]));

    assert!(resolved.clear);
    assert_eq!(resolved.vars["PATH"], format!("/opt/dep/bin:{}", SYSTEM_PATH));
    assert_eq!(resolved.vars["HOME"], "/home/me");
    assert_eq!(resolved.vars["LC_ALL"], "C");
    assert!(!resolved.vars.contains_key("EDITOR"));
  }

  #[test]
  fn isolated_mode_builds_flags_from_recorded_prefixes() {
    let temp = TempDir::new().unwrap();
    let readline = temp.path().join("opt/readline");
    let gettext = temp.path().join("opt/gettext");
    std::fs::create_dir_all(readline.join("include")).unwrap();
    std::fs::create_dir_all(readline.join("lib")).unwrap();
    std::fs::create_dir_all(gettext.join("lib")).unwrap();

    let mut env = BuildEnv::new(EnvMode::Isolated);
    env.prepend_dep_prefix("readline", &readline);
    env.prepend_dep_prefix("gettext", &gettext);

    let resolved = env.materialize(&HashMap::new());

    assert_eq!(
      resolved.vars["LDFLAGS"],
      format!("-L{} -L{}", gettext.join("lib").display(), readline.join("lib").display())
    );
    assert_eq!(resolved.vars["CPPFLAGS"], format!("-I{}", readline.join("include").display()));
    assert_eq!(resolved.vars[DEP_PREFIXES_ENV], "gettext readline");
  }

  #[test]
  fn isolated_flags_follow_prefixes_outside_the_root() {
    let temp = TempDir::new().unwrap();
    let custom = temp.path().join("custom/libidn2");
    std::fs::create_dir_all(custom.join("include")).unwrap();
    std::fs::create_dir_all(custom.join("lib")).unwrap();

    let mut env = BuildEnv::new(EnvMode::Isolated);
    env.prepend_dep_prefix("libidn2", &custom);

    let resolved = env.materialize(&HashMap::new());

    assert_eq!(resolved.vars["LDFLAGS"], format!("-L{}", custom.join("lib").display()));
    assert_eq!(resolved.vars["CPPFLAGS"], format!("-I{}", custom.join("include").display()));
  }

  #[test]
  fn env_mode_parses_aliases() {
    assert_eq!("superenv".parse::<EnvMode>().unwrap(), EnvMode::Isolated);
    assert_eq!("STD".parse::<EnvMode>().unwrap(), EnvMode::Merged);
    assert!("hybrid".parse::<EnvMode>().is_err());
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn apply_reaches_the_spawned_command() {
    let mut env = BuildEnv::new(EnvMode::Isolated);
    env.set("GREETING", "hello");

    let mut command = Command::new("/bin/sh");
    command.arg("-c").arg("echo \"$GREETING:$EDITOR\"");
    env.apply(&mut command);

    let output = command.output().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello:");
  }
}
