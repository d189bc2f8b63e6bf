//! Build command execution.
//!
//! Formula install steps are shell snippets. Each one runs in the working
//! directory with the build environment applied and the operator's terminal
//! attached, so build output streams as it happens.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::build::types::{BuildError, InstallContext};

/// Execute one install step.
///
/// # Arguments
///
/// * `cmd` - The command string to execute
/// * `ctx` - Build environment, working directory and optional shell override
///
/// Stdio is inherited rather than captured. A step that backgrounds a process
/// holding its stdout must not stall the build.
pub async fn execute_cmd(cmd: &str, ctx: &InstallContext<'_>) -> Result<(), BuildError> {
  info!(cmd = %cmd, "executing command");

  let (shell_cmd, shell_args) = get_shell(ctx.shell);

  let mut command = Command::new(&shell_cmd);
  command.args(&shell_args).arg(cmd).current_dir(ctx.workdir);
  ctx.env.apply(&mut command);

  debug!(shell = %shell_cmd, working_dir = ?ctx.workdir, "spawning process");

  let status = command.status().await.map_err(|source| BuildError::Spawn {
    shell: shell_cmd.clone(),
    source,
  })?;

  if !status.success() {
    return Err(BuildError::CmdFailed {
      cmd: cmd.to_string(),
      code: status.code(),
    });
  }

  Ok(())
}

/// Get the shell command and argument.
///
/// Defaults to `/bin/sh` rather than `$SHELL`: interactive shells may source
/// profile files that rewrite `PATH` behind the build environment's back.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  match override_shell {
    Some(shell) => (shell.to_string(), vec!["-c".to_string()]),
    None => ("/bin/sh".to_string(), vec!["-c".to_string()]),
  }
}

/// Shell for an interactive session: the operator's own, falling back to `/bin/sh`.
pub fn interactive_shell(ambient_shell: Option<&str>) -> &str {
  match ambient_shell {
    Some(shell) if Path::new(shell).is_absolute() => shell,
    _ => "/bin/sh",
  }
}
