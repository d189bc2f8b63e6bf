use anyhow::Result;
use serde::Serialize;

use kegbuild_lib::config::BuildConfig;
use kegbuild_lib::platform::Os;
use kegbuild_lib::output::{print_info, print_stat};

use crate::output::{OutputFormat, print_json};

#[derive(Serialize)]
struct Info {
  version: &'static str,
  os: Option<&'static str>,
  #[serde(flatten)]
  config: BuildConfig,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    os: Os::current().map(|os| os.as_str()),
    config: BuildConfig::from_env()?,
  };

  if output.is_json() {
    return print_json(&info);
  }

  print_info(&format!("kegbuild v{}", info.version));
  print_stat("OS", info.os.unwrap_or("unsupported"));
  print_stat("Root", &info.config.root.display().to_string());
  print_stat("Environment", info.config.env_mode.as_str());
  print_stat("Compiler", &info.config.compiler.to_string());
  if let Some(shell) = &info.config.shell {
    print_stat("Shell", shell);
  }

  Ok(())
}
