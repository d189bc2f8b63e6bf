//! Structured failure records.
//!
//! A failed build is reported as exactly one [`FailureRecord`]. The child
//! serializes it onto the error pipe as a single JSON document; the parent
//! reads it back with [`crate::channel::read_failure`]. Both sides share this
//! type, and `version` is bumped whenever the wire shape changes.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};

use serde::{Deserialize, Serialize};

use crate::consts::FAILURE_SCHEMA_VERSION;
use crate::deps::DependencyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// The build or install procedure failed.
  Build,
  /// A keg-only dependency is missing its opt prefix.
  DependencyPrecondition,
  /// Setup failed before the build procedure started.
  Bootstrap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
  pub version: u32,
  pub kind: FailureKind,
  pub message: String,
  /// Underlying causes, outermost first. Does not repeat `message`.
  #[serde(default)]
  pub chain: Vec<String>,
  #[serde(default)]
  pub backtrace: String,
}

impl FailureRecord {
  pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
    Self {
      version: FAILURE_SCHEMA_VERSION,
      kind,
      message: message.into(),
      chain: Vec::new(),
      backtrace: String::new(),
    }
  }

  /// Build a record from an error, classifying it.
  ///
  /// A [`DependencyError`] anywhere in the chain makes the record a
  /// dependency precondition failure. Otherwise `kind` is used.
  pub fn from_error(err: &anyhow::Error, kind: FailureKind) -> Self {
    let kind = if err.chain().any(|cause| cause.is::<DependencyError>()) {
      FailureKind::DependencyPrecondition
    } else {
      kind
    };

    // anyhow only captures when RUST_BACKTRACE or RUST_LIB_BACKTRACE is set.
    let backtrace = err.backtrace();
    let backtrace = match backtrace.status() {
      BacktraceStatus::Captured => backtrace.to_string(),
      _ => Backtrace::force_capture().to_string(),
    };

    Self {
      version: FAILURE_SCHEMA_VERSION,
      kind,
      message: err.to_string(),
      chain: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
      backtrace,
    }
  }

  /// Build a record from a caught panic payload.
  ///
  /// The backtrace is taken where the panic was caught. Use
  /// [`FailureRecord::with_backtrace`] when the panic site was captured.
  pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "unknown panic payload".to_string()
    };

    Self::new(FailureKind::Build, format!("build panicked: {}", detail))
      .with_backtrace(Backtrace::force_capture().to_string())
  }

  pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
    self.backtrace = backtrace.into();
    self
  }
}
