mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, cmd_build, cmd_info, cmd_install};
use output::OutputFormat;

/// kegbuild - isolated formula builds
#[derive(Parser)]
#[command(name = "kegbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a formula in this process, reporting failures on the inherited error pipe
  Build(BuildArgs),

  /// Build a formula in a supervised child process
  Install(BuildArgs),

  /// Show the build configuration taken from the environment
  Info {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build(args) => cmd_build(&args),
    Commands::Install(args) => cmd_install(&args, cli.verbose),
    Commands::Info { output } => cmd_info(output),
  }
}
