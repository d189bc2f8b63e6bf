//! Entry point of the build child.
//!
//! [`run`] owns the whole life of one build attempt: it acquires the error
//! pipe, drops cached credentials, loads the formula, prepares the
//! environment and runs the [`BuildExecutor`]. Whatever happens in between,
//! including a panic, ends in exactly one [`FailureChannel::deliver`] call.

use std::io::Write;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::build::{BuildExecutor, BuildOptions, BuildOutcome};
use crate::channel::{ErrorPipe, FailureChannel, Termination};
use crate::compiler::CompilerGate;
use crate::config::BuildConfig;
use crate::consts::PREFIX_ENV;
use crate::deps::{dedup, resolve_dependencies};
use crate::env::BuildEnv;
use crate::failure::{FailureKind, FailureRecord};
use crate::formula::{Formula, JsonFormula};
use crate::output::{print_success, print_warning};
use crate::platform::credentials::{CredentialCache, SudoCredentials};

/// Everything the child needs to attempt one build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  pub formula: PathBuf,
  /// Unpacked sources. Install steps run here.
  pub workdir: PathBuf,
  pub config: BuildConfig,
  pub options: BuildOptions,
}

/// Run one build attempt and report its outcome.
///
/// An `Err` request is reported as a bootstrap failure through the same
/// channel as any other failure.
pub fn run(request: anyhow::Result<BuildRequest>) -> Termination {
  let pipe = match ErrorPipe::from_env() {
    Ok(pipe) => pipe,
    Err(e) => {
      let err = anyhow::Error::new(e).context("failed to open error pipe");
      return FailureChannel::<ErrorPipe>::new(None).deliver(Err(FailureRecord::from_error(&err, FailureKind::Bootstrap)));
    }
  };

  run_with(request, pipe, &SudoCredentials::default())
}

/// [`run`] with an explicit report destination and credential cache.
pub fn run_with<P: Write, C: CredentialCache>(
  request: anyhow::Result<BuildRequest>,
  pipe: Option<P>,
  credentials: &C,
) -> Termination {
  let channel = FailureChannel::new(pipe);
  debug!(has_pipe = channel.has_pipe(), "build child starting");

  let result = guarded(|| execute(request, credentials));
  channel.deliver(result)
}

/// Run `f`, turning a panic into a build failure.
///
/// A temporary panic hook records the backtrace at the panic site; the
/// previous hook is restored before returning.
fn guarded(f: impl FnOnce() -> Result<(), FailureRecord>) -> Result<(), FailureRecord> {
  let captured: Arc<Mutex<Option<String>>> = Arc::default();
  let previous = panic::take_hook();
  {
    let captured = Arc::clone(&captured);
    panic::set_hook(Box::new(move |_: &panic::PanicHookInfo<'_>| {
      if let Ok(mut slot) = captured.lock() {
        *slot = Some(Backtrace::force_capture().to_string());
      }
    }));
  }

  let result = panic::catch_unwind(AssertUnwindSafe(f));
  panic::set_hook(previous);

  result.unwrap_or_else(|payload| {
    warn!("build panicked");
    let record = FailureRecord::from_panic(payload.as_ref());
    match captured.lock().ok().and_then(|mut slot| slot.take()) {
      Some(backtrace) => Err(record.with_backtrace(backtrace)),
      None => Err(record),
    }
  })
}

fn execute<C: CredentialCache>(request: anyhow::Result<BuildRequest>, credentials: &C) -> Result<(), FailureRecord> {
  let bootstrap = |e: anyhow::Error| FailureRecord::from_error(&e, FailureKind::Bootstrap);

  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("failed to create async runtime")
    .map_err(bootstrap)?;

  runtime.block_on(async {
    credentials.invalidate().await;

    let request = request.map_err(bootstrap)?;
    let paths = request.config.paths();
    let formula = JsonFormula::load(&request.formula, &paths)
      .await
      .map_err(|e| bootstrap(e.into()))?;

    let outcome = attempt(&formula, &request.config, &request.workdir, request.options)
      .await
      .with_context(|| format!("failed to build {}", formula.name()))
      .map_err(|e| FailureRecord::from_error(&e, FailureKind::Build))?;

    if let BuildOutcome::Installed { prefix, .. } = outcome {
      print_success(&format!("{} installed to {}", formula.name(), prefix.display()));
    }
    Ok::<(), FailureRecord>(())
  })
}

/// Prepare the environment for `formula` and run it.
///
/// Requirements adjust the environment first, then keg-only dependencies are
/// injected, then the compiler is checked against the formula's
/// incompatibilities and exported.
pub async fn attempt<F: Formula>(
  formula: &F,
  config: &BuildConfig,
  workdir: &Path,
  options: BuildOptions,
) -> anyhow::Result<BuildOutcome> {
  info!(name = %formula.name(), mode = %config.env_mode, "preparing build");

  let mut env = BuildEnv::new(config.env_mode);

  for requirement in formula.requirements() {
    requirement.modify_build_environment(&mut env);
  }

  let deps = dedup(formula.recursive_dependencies());
  resolve_dependencies(&deps, &mut env)?;

  let mut compiler = config.compiler;
  if let Some(substitution) = CompilerGate::new(formula.fails_with()).check(&mut compiler) {
    print_warning(&substitution.to_string());
  }
  compiler.export(&mut env);
  env.set(PREFIX_ENV, formula.prefix().to_string_lossy());

  let mut executor = BuildExecutor::new(&env, workdir, options).with_shell(config.shell.as_deref());
  let outcome = executor.run(formula).await?;

  Ok(outcome)
}
