//! Build execution.
//!
//! Runs a formula's install procedure inside the prepared environment and
//! copies its metadata files into the install prefix.
//!
//! # Submodules
//!
//! - [`cmd`] - Shell command execution with a build environment applied
//! - [`execute`] - The executor state machine
//! - [`metadata`] - Post-install copying of README, LICENSE and friends
//! - [`snapshot`] - Optional git snapshot of the working directory

pub mod cmd;
pub mod execute;
pub mod metadata;
pub mod snapshot;
mod types;

pub use execute::BuildExecutor;
pub use types::*;
