//! Metadata file installation.
//!
//! After a successful install, well-known files such as `LICENSE` and
//! `ChangeLog` are copied from the working directory into the prefix. Every
//! step is best effort: a formula without a changelog still installs.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

/// Copy each of `names` from `workdir` into `prefix`.
///
/// For each name: directories are skipped, a `<name>.txt` sibling is preferred
/// when present, and one level of symlink is resolved. Returns the names that
/// were copied.
pub async fn install_metadata_files(workdir: &Path, prefix: &Path, names: &[&str]) -> Vec<String> {
  let mut installed = Vec::new();

  for name in names {
    let candidate = workdir.join(name);
    if candidate.is_dir() {
      debug!(name, "metadata name is a directory, skipping");
      continue;
    }

    let txt = workdir.join(format!("{}.txt", name));
    let source = if txt.exists() { txt } else { candidate };
    let source = resolve_symlink(&source).await;
    let dest = prefix.join(name);

    if let Err(e) = fs::copy(&source, &dest).await {
      if e.kind() == io::ErrorKind::NotFound {
        debug!(name, "metadata file not present");
      } else {
        warn!(name, source = ?source, error = %e, "failed to copy metadata file");
      }
      continue;
    }

    if let Err(e) = set_readable(&dest).await {
      warn!(path = ?dest, error = %e, "installed metadata file but could not normalize permissions");
    }

    installed.push(name.to_string());
  }

  installed
}

/// Follow `path` through one symlink. Relative targets resolve against the link's directory.
pub async fn resolve_symlink(path: &Path) -> PathBuf {
  let is_link = fs::symlink_metadata(path)
    .await
    .map(|m| m.file_type().is_symlink())
    .unwrap_or(false);
  if !is_link {
    return path.to_path_buf();
  }

  match fs::read_link(path).await {
    Ok(target) if target.is_absolute() => target,
    Ok(target) => path.parent().map(|p| p.join(&target)).unwrap_or(target),
    Err(_) => path.to_path_buf(),
  }
}

#[cfg(unix)]
async fn set_readable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await
}

#[cfg(not(unix))]
async fn set_readable(_path: &Path) -> io::Result<()> {
  Ok(())
}
