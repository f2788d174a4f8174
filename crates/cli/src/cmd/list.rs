use anyhow::{Context, Result};

use layerreg_lib::{Config, StoreOpener};

use super::open_store;
use crate::output::{OutputFormat, format_layer, print_info, print_json};

pub fn cmd_list(config: &Config, output: OutputFormat) -> Result<()> {
  let store = open_store(config)?;
  let entries = store
    .read_entries()
    .with_context(|| format!("Failed to read layer store {}", config.store))?;
  let report = config.registrar().inspect(&entries);

  if output.is_json() {
    print_json(&report)?;
    return Ok(());
  }

  if report.layers.is_empty() {
    print_info(&format!("No implicit layers registered in {}", config.store));
    return Ok(());
  }

  println!("Implicit layers in {} (load order):", config.store);
  for layer in &report.layers {
    println!("{}", format_layer(layer));
  }

  Ok(())
}
