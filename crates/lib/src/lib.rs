//! kegbuild-lib: the isolated build child of a source package manager
//!
//! One build attempt runs in its own process. This crate provides the pieces
//! of that process:
//! - `deps`: injects keg-only dependency search paths into the build environment
//! - `compiler`: swaps out a compiler the formula is known to fail with
//! - `build`: runs the install procedure and copies metadata files
//! - `channel`: reports the outcome to the parent over an inherited pipe
//! - `bootstrap`: ties the above together behind a single exit path
//! - `supervise`: the parent side of the pipe handoff

pub mod bootstrap;
pub mod build;
pub mod channel;
pub mod compiler;
pub mod config;
pub mod consts;
pub mod deps;
pub mod env;
pub mod failure;
pub mod formula;
pub mod output;
pub mod platform;
#[cfg(unix)]
pub mod supervise;
