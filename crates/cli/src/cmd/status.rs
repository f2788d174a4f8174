//! Status command implementation.
//!
//! Reports whether the layer is registered exactly once, enabled, and last.
//! Exits with an error when it is not, so scripts can use it as a check.

use anyhow::{Context, Result, bail};

use layerreg_lib::{Config, RegistrationStatus, StoreOpener};

use super::open_store;
use crate::output::{OutputFormat, print_json, print_stat, print_success, print_warning};

pub fn cmd_status(config: &Config, output: OutputFormat) -> Result<()> {
  let store = open_store(config)?;
  let entries = store
    .read_entries()
    .with_context(|| format!("Failed to read layer store {}", config.store))?;
  let report = config.registrar().inspect(&entries);
  let status = report.status();

  if output.is_json() {
    print_json(&status)?;
  } else {
    match &status {
      RegistrationStatus::Registered { manifest_path } => {
        print_success(&format!("{} is registered and loads last", report.manifest_name));
        print_stat("Manifest", manifest_path);
      }
      RegistrationStatus::NotRegistered => {
        print_warning(&format!("{} is not registered", report.manifest_name));
      }
      RegistrationStatus::Degraded { entries, problems } => {
        print_warning(&format!("{} is registered with problems", report.manifest_name));
        for problem in problems {
          print_stat("Problem", problem);
        }
        for entry in entries {
          print_stat("Entry", entry);
        }
      }
    }
    print_stat("Store", &config.store.to_string());
  }

  if !report.is_healthy() {
    bail!("layer registration needs repair; run 'layerreg register'");
  }
  Ok(())
}
