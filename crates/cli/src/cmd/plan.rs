//! Implementation of the `layerreg plan` command.
//!
//! Reads the store and prints the registration changes without writing.

use anyhow::{Context, Result};

use layerreg_lib::{Config, StoreOpener};

use super::open_store;
use crate::output::{OutputFormat, print_addition, print_info, print_json, print_removal, print_stat};

pub fn cmd_plan(config: &Config, install_dir: &str, output: OutputFormat) -> Result<()> {
  let store = open_store(config)?;
  let registrar = config.registrar();

  let entries = store
    .read_entries()
    .with_context(|| format!("Failed to read layer store {}", config.store))?;
  let plan = registrar.plan(install_dir, &entries)?;
  let noop = plan.is_noop(&entries);
  let after = plan.apply_to(&entries);

  if output.is_json() {
    let json_output = serde_json::json!({
      "store": config.store.to_string(),
      "noop": noop,
      "removals": &plan.removals,
      "insert": &plan.insert,
      "result": &after,
    });
    print_json(&json_output)?;
    return Ok(());
  }

  if noop {
    print_info("Layer is already registered last; registering again changes nothing");
    return Ok(());
  }

  println!("Changes to {}:", config.store);
  for stale in &plan.removals {
    print_removal(&stale.manifest_path);
  }
  print_addition(&plan.insert.manifest_path);
  println!();
  print_stat("Load position", &format!("{} of {}", after.len(), after.len()));

  Ok(())
}
