use std::path::PathBuf;

/// Default installation root when `KEGBUILD_ROOT` is unset.
pub const DEFAULT_ROOT: &str = "/usr/local";

/// Layout of an installation root.
///
/// Kegs live under `Cellar/<name>/<version>`, and each installed formula gets a
/// stable `opt/<name>` alias pointing at its current keg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KegPaths {
  pub root: PathBuf,
}

impl KegPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Stable, version-independent prefix of an installed formula.
  pub fn opt_dir(&self, name: &str) -> PathBuf {
    self.root.join("opt").join(name)
  }

  /// Versioned keg directory a build installs into.
  pub fn keg_dir(&self, name: &str, version: &str) -> PathBuf {
    self.root.join("Cellar").join(name).join(version)
  }
}

/// Resolve the root from `KEGBUILD_ROOT`, falling back to [`DEFAULT_ROOT`].
pub fn root_dir() -> PathBuf {
  if let Ok(path) = std::env::var("KEGBUILD_ROOT")
    && !path.is_empty()
  {
    return PathBuf::from(path);
  }

  PathBuf::from(DEFAULT_ROOT)
}
