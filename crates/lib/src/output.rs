//! Operator-facing terminal output.
//!
//! Build logs go through `tracing`. Everything here is meant for the person
//! running the build: banners, advisories and failure reports.

use std::io::{self, Write};

use owo_colors::{OwoColorize, Stream};

use crate::failure::FailureRecord;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "==>";
}

/// Section banner, e.g. `==> Entering interactive mode`.
pub fn ohai(title: &str) {
  println!(
    "{} {}",
    symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.blue()),
    title.if_supports_color(Stream::Stdout, |s| s.bold())
  );
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Write a failure record for a human: the message, its causes, then the backtrace.
pub fn write_failure(out: &mut impl Write, record: &FailureRecord) -> io::Result<()> {
  writeln!(
    out,
    "{} {}",
    "Error:".if_supports_color(Stream::Stderr, |s| s.red()),
    record.message
  )?;
  for cause in &record.chain {
    writeln!(out, "  caused by: {}", cause)?;
  }
  if !record.backtrace.is_empty() {
    writeln!(out, "{}", record.backtrace.trim_end())?;
  }
  out.flush()
}
