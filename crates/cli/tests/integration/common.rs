//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding an installation root,
/// a source directory and the formula under test.
pub struct TestEnv {
  pub temp: TempDir,
  pub formula_path: PathBuf,
}

impl TestEnv {
  /// Create from a fixture file.
  ///
  /// Copies the fixture content to a temporary `formula.json`.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let formula_path = temp.path().join("formula.json");
    std::fs::write(&formula_path, fixture_content(name)).unwrap();
    let env = Self { temp, formula_path };
    std::fs::create_dir_all(env.workdir()).unwrap();
    std::fs::create_dir_all(env.root_path()).unwrap();
    env
  }

  /// Write a file into the source directory.
  pub fn write_source(&self, relative_path: &str, content: &str) {
    let path = self.workdir().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Installation root (isolated per test).
  pub fn root_path(&self) -> PathBuf {
    self.temp.path().join("root")
  }

  /// Unpacked sources of the formula.
  pub fn workdir(&self) -> PathBuf {
    self.temp.path().join("src")
  }

  /// Keg a formula installs into.
  pub fn keg(&self, name: &str, version: &str) -> PathBuf {
    self.root_path().join("Cellar").join(name).join(version)
  }

  /// Create an installed opt prefix with the given subdirectories.
  pub fn install_opt(&self, name: &str, subdirs: &[&str]) -> PathBuf {
    let opt = self.root_path().join("opt").join(name);
    for sub in subdirs {
      std::fs::create_dir_all(opt.join(sub)).unwrap();
    }
    std::fs::create_dir_all(&opt).unwrap();
    opt
  }

  pub fn read_keg_file(&self, name: &str, file: &str) -> String {
    let path = self.keg(name, "1.0").join(file);
    std::fs::read_to_string(&path)
      .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
      .trim()
      .to_string()
  }

  /// Get a pre-configured Command for the kegbuild binary.
  ///
  /// Sets `KEGBUILD_ROOT` to the isolated root, pins the compiler to gcc and
  /// clears anything that would leak configuration in from the test runner.
  pub fn kegbuild_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("kegbuild");
    cmd.env("KEGBUILD_ROOT", self.root_path());
    cmd.env("KEGBUILD_CC", "gcc");
    cmd.env_remove("KEGBUILD_ENV_MODE");
    cmd.env_remove("KEGBUILD_ERROR_PIPE");
    cmd.env_remove("KEGBUILD_SHELL");
    cmd
  }

  /// `kegbuild <subcommand> <formula> -C <workdir>`
  pub fn formula_cmd(&self, subcommand: &str) -> Command {
    let mut cmd = self.kegbuild_cmd();
    cmd
      .arg(subcommand)
      .arg(&self.formula_path)
      .arg("-C")
      .arg(self.workdir());
    cmd
  }

  /// Same as [`TestEnv::formula_cmd`] for `build`, as a std command.
  pub fn std_build_cmd(&self) -> std::process::Command {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("kegbuild"));
    cmd
      .env("KEGBUILD_ROOT", self.root_path())
      .env("KEGBUILD_CC", "gcc")
      .env_remove("KEGBUILD_ENV_MODE")
      .env_remove("KEGBUILD_SHELL")
      .arg("build")
      .arg(&self.formula_path)
      .arg("-C")
      .arg(self.workdir());
    cmd
  }
}

/// Run `command` with an error pipe attached and collect what it reported.
///
/// Both pipe ends stay close-on-exec in the test process; only the spawned
/// child gets an inheritable write end.
#[cfg(unix)]
pub fn run_with_error_pipe(
  mut command: std::process::Command,
) -> (std::process::Output, Option<kegbuild_lib::failure::FailureRecord>) {
  use std::os::fd::{AsRawFd, BorrowedFd};
  use std::os::unix::process::CommandExt;

  use rustix::io::{FdFlags, fcntl_setfd};

  let (read_end, write_end) = rustix::pipe::pipe().unwrap();
  fcntl_setfd(&read_end, FdFlags::CLOEXEC).unwrap();
  fcntl_setfd(&write_end, FdFlags::CLOEXEC).unwrap();

  let fd = write_end.as_raw_fd();
  command.env("KEGBUILD_ERROR_PIPE", fd.to_string());
  unsafe {
    command.pre_exec(move || {
      fcntl_setfd(BorrowedFd::borrow_raw(fd), FdFlags::empty())?;
      Ok(())
    });
  }

  let output = command.output().unwrap();
  drop(write_end);

  let failure = kegbuild_lib::channel::read_failure(std::fs::File::from(read_end)).unwrap();
  (output, failure)
}

pub fn stderr_of(output: &std::process::Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}
