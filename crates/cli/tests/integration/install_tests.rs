//! `kegbuild install` integration tests: supervisor and child together.

use std::time::Duration;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn install_succeeds() {
  let env = TestEnv::from_fixture("hello.json");

  env
    .formula_cmd("install")
    .assert()
    .success()
    .stdout(predicate::str::contains("==> Building"))
    .stdout(predicate::str::contains("hello installed to"));

  assert!(env.keg("hello", "1.0").join("bin/hello").exists());
}

#[test]
fn install_presents_the_child_failure() {
  let env = TestEnv::from_fixture("broken.json");

  env
    .formula_cmd("install")
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to build broken"))
    .stderr(predicate::str::contains("caused by: command failed with exit code Some(3)"))
    .stderr(predicate::str::contains("build of"));
}

#[test]
fn install_presents_missing_dependencies() {
  let env = TestEnv::from_fixture("keg_only_dep.json");

  env
    .formula_cmd("install")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Reinstall openssl"));
}

#[test]
fn install_returns_while_a_daemon_keeps_running() {
  let env = TestEnv::from_fixture("daemon.json");

  env
    .formula_cmd("install")
    .timeout(Duration::from_secs(20))
    .assert()
    .success();

  assert!(env.keg("daemon", "1.0").join("started").exists());
}
