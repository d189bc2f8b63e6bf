//! `kegbuild build` integration tests: the build child on its own.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_installs_into_keg() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("hello.json");
  env.write_source("LICENSE", "MIT");

  env
    .formula_cmd("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("hello installed to"));

  let keg = env.keg("hello", "1.0");
  assert!(keg.join("bin/hello").exists());
  assert_eq!(std::fs::read_to_string(keg.join("LICENSE")).unwrap(), "MIT");
  assert_eq!(env.read_keg_file("hello", "compiler"), "gcc");
}

#[test]
fn missing_metadata_files_do_not_fail_the_build() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("hello.json");

  env.formula_cmd("build").assert().success();

  assert!(!env.keg("hello", "1.0").join("ChangeLog").exists());
}

#[test]
fn failure_without_pipe_is_reported_locally() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("broken.json");

  env
    .formula_cmd("build")
    .assert()
    .code(2)
    .stdout(predicate::str::contains("configuring"))
    .stderr(predicate::str::contains("failed to build broken"))
    .stderr(predicate::str::contains("exit code Some(3)"));

  assert!(!env.keg("broken", "1.0").join("unreachable").exists());
}

#[test]
fn missing_keg_only_dependency_names_the_dependency() {
  let env = TestEnv::from_fixture("keg_only_dep.json");

  env
    .formula_cmd("build")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("opt/openssl not present"))
    .stderr(predicate::str::contains("Reinstall openssl"));

  assert!(!env.keg("wget", "1.0").exists());
}

#[test]
fn keg_only_dependency_paths_reach_the_build() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("keg_only_dep.json");
  let opt = env.install_opt("openssl", &["lib/pkgconfig", "include"]);

  env.formula_cmd("build").assert().success();

  let pkg_config_path = env.read_keg_file("wget", "pkg_config_path");
  assert_eq!(
    pkg_config_path,
    format!("{}:{}", opt.join("share/pkgconfig").display(), opt.join("lib/pkgconfig").display())
  );
  assert_eq!(env.read_keg_file("wget", "ldflags"), format!("-L{}", opt.join("lib").display()));
}

#[test]
fn merged_mode_adds_flags_to_inherited_values() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("keg_only_dep.json");
  let opt = env.install_opt("openssl", &["lib", "include"]);

  env
    .formula_cmd("build")
    .env("KEGBUILD_ENV_MODE", "merged")
    .env("LDFLAGS", "-L/usr/lib/extra")
    .assert()
    .success();

  assert_eq!(
    env.read_keg_file("wget", "ldflags"),
    format!("-L{} -L/usr/lib/extra", opt.join("lib").display())
  );
}

#[test]
fn incompatible_compiler_is_replaced_with_advisory() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("picky.json");

  env
    .formula_cmd("build")
    .assert()
    .success()
    .stderr(predicate::str::contains("will not build with gcc"))
    .stderr(predicate::str::contains("miscompiles the parser"));

  assert_eq!(env.read_keg_file("picky", "compiler"), "clang");
}

#[test]
fn requirements_adjust_the_environment() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("requirement.json");

  env.formula_cmd("build").assert().success();

  assert_eq!(env.read_keg_file("needs-x11", "display"), ":0");
}

#[test]
fn invalid_compiler_setting_is_a_bootstrap_failure() {
  let env = TestEnv::from_fixture("hello.json");

  env
    .formula_cmd("build")
    .env("KEGBUILD_CC", "tcc")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("invalid KEGBUILD_CC"));
}

#[test]
fn malformed_error_pipe_variable_is_reported_locally() {
  let env = TestEnv::from_fixture("hello.json");

  env
    .formula_cmd("build")
    .env("KEGBUILD_ERROR_PIPE", "not-a-number")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("failed to open error pipe"));

  assert!(!env.keg("hello", "1.0").exists());
}

#[test]
fn interactive_mode_installs_nothing() {
  if cfg!(windows) {
    return;
  }

  let env = TestEnv::from_fixture("hello.json");

  env
    .formula_cmd("build")
    .arg("--interactive")
    .env("SHELL", "/bin/true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Entering interactive mode"))
    .stdout(predicate::str::contains(env.keg("hello", "1.0").display().to_string()));

  assert!(!env.keg("hello", "1.0").exists());
}

#[cfg(unix)]
mod with_error_pipe {
  use std::time::{Duration, Instant};

  use kegbuild_lib::failure::FailureKind;

  use super::super::common::{TestEnv, run_with_error_pipe, stderr_of};

  #[test]
  fn failure_is_written_to_the_pipe() {
    let env = TestEnv::from_fixture("broken.json");

    let (output, failure) = run_with_error_pipe(env.std_build_cmd());

    assert_eq!(output.status.code(), Some(1));
    let record = failure.expect("child should report a failure record");
    assert_eq!(record.kind, FailureKind::Build);
    assert_eq!(record.message, "failed to build broken");
    assert!(record.chain.iter().any(|c| c.contains("exit code Some(3)")));
    assert!(!stderr_of(&output).contains("failed to build broken"));
  }

  #[test]
  fn dependency_failure_has_its_own_kind() {
    let env = TestEnv::from_fixture("keg_only_dep.json");

    let (output, failure) = run_with_error_pipe(env.std_build_cmd());

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(failure.unwrap().kind, FailureKind::DependencyPrecondition);
  }

  #[test]
  fn success_leaves_the_pipe_empty() {
    let env = TestEnv::from_fixture("hello.json");

    let (output, failure) = run_with_error_pipe(env.std_build_cmd());

    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(failure.is_none());
  }

  #[test]
  fn background_process_does_not_hold_the_pipe_open() {
    let env = TestEnv::from_fixture("daemon.json");
    let started = Instant::now();

    let (output, failure) = run_with_error_pipe(env.std_build_cmd());

    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(failure.is_none());
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(env.read_keg_file("daemon", "started"), "started");
  }
}
