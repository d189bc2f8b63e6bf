//! Names and fixed values shared between the build child and its parent.

/// Environment variable holding the numeric descriptor of the error pipe.
pub const ERROR_PIPE_ENV: &str = "KEGBUILD_ERROR_PIPE";

/// Isolation hint: space separated names of keg-only dependencies.
pub const DEP_PREFIXES_ENV: &str = "KEGBUILD_DEP_PREFIXES";

/// Install prefix exported to build commands.
pub const PREFIX_ENV: &str = "KEGBUILD_PREFIX";

/// Files copied from the build directory into the install prefix after install.
pub const META_FILES: &[&str] = &[
  "README",
  "README.md",
  "ChangeLog",
  "CHANGES",
  "COPYING",
  "LICENSE",
  "LICENCE",
  "COPYRIGHT",
  "AUTHORS",
];

/// Exit status when the build completed (or the interactive session ended).
pub const EXIT_COMPLETED: i32 = 0;

/// Exit status when a failure record was written to the error pipe.
pub const EXIT_REPORTED_TO_PARENT: i32 = 1;

/// Exit status when a failure was printed locally because no pipe was supplied.
pub const EXIT_REPORTED_LOCALLY: i32 = 2;

/// Version of the failure record wire format.
pub const FAILURE_SCHEMA_VERSION: u32 = 1;

/// Value is 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch)
pub const SOURCE_DATE_EPOCH: &str = "315532800";
