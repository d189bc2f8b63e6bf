use std::fmt;

use crate::compiler::CompilerFamily;

/// Operating systems a build can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
    }
  }

  /// Compiler selected when neither the command line nor `KEGBUILD_CC` picks one.
  pub fn default_compiler(&self) -> CompilerFamily {
    match self {
      Self::Linux => CompilerFamily::Gcc,
      Self::MacOs => CompilerFamily::Clang,
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
