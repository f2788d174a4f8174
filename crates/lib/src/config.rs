//! Runtime configuration.
//!
//! Values are taken, in order of precedence, from explicit arguments, the
//! `LAYERREG_*` environment variables, and the platform defaults.

use std::path::PathBuf;

use tracing::debug;

use crate::consts::{MANIFEST_FILE_NAME, MANIFEST_NAME_ENV, STORE_ENV};
use crate::platform::default_store_location;
use crate::registrar::LayerRegistrar;
use crate::store::StoreLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Where the layer store lives.
  pub store: StoreLocation,
  /// Manifest filename identifying this layer's entries.
  pub manifest_name: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      store: default_store_location(),
      manifest_name: MANIFEST_FILE_NAME.to_string(),
    }
  }
}

impl Config {
  /// Resolve configuration from explicit overrides, the environment and defaults.
  pub fn resolve(store: Option<PathBuf>, manifest_name: Option<String>) -> Self {
    let defaults = Self::default();

    let store = store
      .or_else(|| env_value(STORE_ENV).map(PathBuf::from))
      .map(StoreLocation::File)
      .unwrap_or(defaults.store);
    let manifest_name = manifest_name
      .or_else(|| env_value(MANIFEST_NAME_ENV))
      .unwrap_or(defaults.manifest_name);

    debug!(store = %store, manifest = %manifest_name, "resolved configuration");
    Self { store, manifest_name }
  }

  /// A registrar for the configured manifest.
  ///
  /// Registry keys always use `\`; file stores use the host separator.
  pub fn registrar(&self) -> LayerRegistrar {
    let registrar = LayerRegistrar::new(self.manifest_name.clone());
    match self.store {
      StoreLocation::Registry => registrar.with_separator('\\'),
      StoreLocation::File(_) => registrar,
    }
  }
}

fn env_value(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
