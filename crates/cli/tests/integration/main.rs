//! CLI integration tests.

mod build_tests;
mod common;
#[cfg(unix)]
mod install_tests;
