mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use layerreg_lib::Config;

use crate::output::{OutputFormat, print_error};

/// layerreg - Register an OpenXR implicit API layer with the loader
#[derive(Parser)]
#[command(name = "layerreg")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Use a JSON file as the layer store instead of the platform default
  #[arg(long, global = true, value_name = "PATH")]
  store: Option<PathBuf>,

  /// Manifest filename identifying this layer
  #[arg(long, global = true, value_name = "NAME")]
  manifest_name: Option<String>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

/// Where the layer was installed.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct InstallTarget {
  /// Directory containing the layer manifest
  install_dir: Option<String>,

  /// Path of the installed assembly; its directory is the install directory
  #[arg(long, value_name = "PATH")]
  assembly_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
  /// Register the layer so it loads after every other implicit layer
  Register {
    #[command(flatten)]
    target: InstallTarget,
  },

  /// Show what registering would change without modifying the store
  Plan {
    #[command(flatten)]
    target: InstallTarget,
  },

  /// List registered implicit layers in load order
  List,

  /// Check whether the layer is registered once, enabled, and last
  Status,
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(err) = run(cli) {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let config = Config::resolve(cli.store, cli.manifest_name);

  match cli.command {
    Commands::Register { target } => cmd::cmd_register(&config, &target.resolve()?, cli.output),
    Commands::Plan { target } => cmd::cmd_plan(&config, &target.resolve()?, cli.output),
    Commands::List => cmd::cmd_list(&config, cli.output),
    Commands::Status => cmd::cmd_status(&config, cli.output),
  }
}

impl InstallTarget {
  fn resolve(self) -> Result<String> {
    match (self.install_dir, self.assembly_path) {
      (Some(dir), _) => Ok(dir),
      (None, Some(assembly)) => Ok(layerreg_lib::LayerRegistrar::install_dir_from_assembly_path(&assembly)?),
      (None, None) => anyhow::bail!("an install directory or --assembly-path is required"),
    }
  }
}
