//! Layer entries as the loader sees them.
//!
//! Each entry maps the absolute path of a layer manifest to a `DWORD` flag.
//! The loader treats `0` as enabled and any other value as disabled.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw flag value the loader interprets as "enabled".
pub const ENABLED: u32 = 0;

/// Raw flag value written when disabling a layer.
pub const DISABLED: u32 = 1;

/// Whether the loader will activate a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerState {
  Enabled,
  Disabled,
}

impl LayerState {
  /// Decode a raw flag value.
  pub fn from_value(value: u32) -> Self {
    if value == ENABLED { Self::Enabled } else { Self::Disabled }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Enabled => "enabled",
      Self::Disabled => "disabled",
    }
  }
}

impl fmt::Display for LayerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One registered implicit layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerEntry {
  /// Absolute path to the layer manifest. Unique within a store.
  pub manifest_path: String,
  /// Raw flag as stored. Nonzero values other than [`DISABLED`] are preserved.
  pub value: u32,
}

impl LayerEntry {
  pub fn new(manifest_path: impl Into<String>, value: u32) -> Self {
    Self {
      manifest_path: manifest_path.into(),
      value,
    }
  }

  /// An enabled entry for the given manifest path.
  pub fn enabled(manifest_path: impl Into<String>) -> Self {
    Self::new(manifest_path, ENABLED)
  }

  pub fn state(&self) -> LayerState {
    LayerState::from_value(self.value)
  }

  pub fn is_enabled(&self) -> bool {
    self.state() == LayerState::Enabled
  }

  /// Final path component of the manifest path.
  pub fn file_name(&self) -> &str {
    file_name(&self.manifest_path)
  }

  /// True when this entry points at a manifest called `manifest_name`, wherever it lives.
  pub fn is_manifest(&self, manifest_name: &str) -> bool {
    self.file_name() == manifest_name
  }
}

/// Returns the text after the last `\` or `/` in `path`.
///
/// Store keys are written by many installers, so both separators are accepted
/// regardless of the host platform. A key without any separator is returned whole.
pub fn file_name(path: &str) -> &str {
  match path.rfind(['\\', '/']) {
    Some(idx) => &path[idx + 1..],
    None => path,
  }
}
