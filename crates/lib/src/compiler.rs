//! Compiler compatibility gate.
//!
//! A formula can declare compilers it is known not to build with. When the
//! active compiler is one of them, the gate swaps in the most preferred
//! compiler the formula accepts and explains why.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::env::BuildEnv;

/// Fallback order when the active compiler is rejected.
pub const PREFERENCE: &[CompilerFamily] = &[CompilerFamily::Clang, CompilerFamily::Gcc, CompilerFamily::LlvmGcc];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerFamily {
  Clang,
  Gcc,
  LlvmGcc,
}

impl CompilerFamily {
  pub fn as_str(&self) -> &'static str {
    match self {
      CompilerFamily::Clang => "clang",
      CompilerFamily::Gcc => "gcc",
      CompilerFamily::LlvmGcc => "llvm-gcc",
    }
  }

  /// C and C++ driver names exported as `CC` and `CXX`.
  pub fn drivers(&self) -> (&'static str, &'static str) {
    match self {
      CompilerFamily::Clang => ("clang", "clang++"),
      CompilerFamily::Gcc => ("gcc", "g++"),
      CompilerFamily::LlvmGcc => ("llvm-gcc", "llvm-g++"),
    }
  }
}

impl fmt::Display for CompilerFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown compiler '{0}' (expected clang, gcc or llvm-gcc)")]
pub struct UnknownCompiler(pub String);

impl FromStr for CompilerFamily {
  type Err = UnknownCompiler;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "clang" => Ok(CompilerFamily::Clang),
      "gcc" => Ok(CompilerFamily::Gcc),
      "llvm" | "llvm-gcc" | "llvm_gcc" => Ok(CompilerFamily::LlvmGcc),
      _ => Err(UnknownCompiler(s.to_string())),
    }
  }
}

/// The compiler in use for this build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDescriptor {
  pub family: CompilerFamily,
  /// Vendor build number, when known.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<u32>,
}

impl CompilerDescriptor {
  pub fn new(family: CompilerFamily) -> Self {
    Self { family, build: None }
  }

  /// Export `CC` and `CXX` for this compiler.
  pub fn export(&self, env: &mut BuildEnv) {
    let (cc, cxx) = self.family.drivers();
    env.set("CC", cc);
    env.set("CXX", cxx);
  }
}

impl fmt::Display for CompilerDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.build {
      Some(build) => write!(f, "{} (build {})", self.family, build),
      None => write!(f, "{}", self.family),
    }
  }
}

/// A declared incompatibility: `fails_with compiler [build <= n] because reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailsWith {
  pub compiler: CompilerFamily,
  /// Only builds up to and including this number fail. `None` means every build.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<u32>,
  #[serde(default)]
  pub reason: Option<String>,
}

impl FailsWith {
  pub fn matches(&self, compiler: &CompilerDescriptor) -> bool {
    if self.compiler != compiler.family {
      return false;
    }
    match (self.build, compiler.build) {
      (Some(max), Some(actual)) => actual <= max,
      _ => true,
    }
  }
}

/// Outcome of a gate that swapped (or tried to swap) the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
  pub from: CompilerDescriptor,
  /// `None` when every known compiler is declared incompatible.
  pub to: Option<CompilerFamily>,
  pub reason: Option<String>,
}

impl fmt::Display for Substitution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.to {
      Some(to) => write!(f, "Formula will not build with {}, using {} instead", self.from, to)?,
      None => write!(
        f,
        "Formula will not build with {} and no other compiler is acceptable; the build may fail",
        self.from
      )?,
    }
    if let Some(reason) = &self.reason {
      write!(f, "\n{}", reason.trim_end())?;
    }
    Ok(())
  }
}

/// One-shot compiler compatibility check for a build attempt.
#[derive(Debug)]
pub struct CompilerGate<'a> {
  fails_with: &'a [FailsWith],
}

impl<'a> CompilerGate<'a> {
  pub fn new(fails_with: &'a [FailsWith]) -> Self {
    Self { fails_with }
  }

  fn incompatible(&self, compiler: &CompilerDescriptor) -> Option<&FailsWith> {
    self.fails_with.iter().find(|rule| rule.matches(compiler))
  }

  /// Check `active` and substitute a fallback if it is incompatible.
  ///
  /// Consumes the gate: a build attempt gets at most one substitution.
  pub fn check(self, active: &mut CompilerDescriptor) -> Option<Substitution> {
    let rule = self.incompatible(active)?;
    let from = *active;

    let fallback = PREFERENCE
      .iter()
      .copied()
      .filter(|family| *family != from.family)
      .find(|family| self.incompatible(&CompilerDescriptor::new(*family)).is_none());

    match fallback {
      Some(family) => {
        info!(from = %from, to = %family, "substituting compiler");
        *active = CompilerDescriptor::new(family);
      }
      None => warn!(compiler = %from, "no acceptable fallback compiler"),
    }

    Some(Substitution {
      from,
      to: fallback,
      reason: rule.reason.clone(),
    })
  }
}
