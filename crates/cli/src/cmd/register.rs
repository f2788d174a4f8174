//! Implementation of the `layerreg register` command.
//!
//! This is the installer hook: it runs once after the layer files are copied
//! and fails the install step if the store cannot be updated.

use anyhow::{Context, Result};
use tracing::debug;

use layerreg_lib::Config;

use super::open_store;
use crate::output::{OutputFormat, print_json, print_removal, print_stat, print_success};

pub fn cmd_register(config: &Config, install_dir: &str, output: OutputFormat) -> Result<()> {
  debug!(install_dir, store = %config.store, "running install hook");
  let store = open_store(config)?;
  let registrar = config.registrar();

  let outcome = registrar
    .register(&store, install_dir)
    .with_context(|| format!("Failed to register {}", registrar.manifest_name()))?;

  if output.is_json() {
    print_json(&outcome)?;
    return Ok(());
  }

  print_success(&format!("Registered {}", outcome.inserted.manifest_path));
  print_stat("Store", &outcome.location);
  if !outcome.removed.is_empty() {
    println!("  Replaced:");
    for stale in &outcome.removed {
      print_removal(&stale.manifest_path);
    }
  }

  Ok(())
}
