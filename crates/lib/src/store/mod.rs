//! Layer store access.
//!
//! The layer store is the machine-wide ordered list of implicit layers the
//! loader consults. Many installers write to it; enumeration order is the order
//! the loader applies layers in, so appending an entry makes it load last.
//!
//! Access goes through two capabilities:
//! - [`StoreOpener`] opens the store, creating it when absent.
//! - [`LayerStore`] enumerates, deletes and sets entries on an open store.
//!
//! # Backends
//!
//! - [`memory::MemoryStore`]: in-process, for tests and dry runs
//! - [`file::FileStore`]: a JSON document on disk
//! - `registry::RegistryStore` (Windows only): `HKLM\SOFTWARE\Khronos\OpenXR\1\ApiLayers\Implicit`
//!
//! [`any::AnyStore`] picks between the file and registry backends at runtime.

pub mod any;
pub mod file;
pub mod memory;
#[cfg(windows)]
pub mod registry;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::entry::LayerEntry;

/// Failures reaching or modifying the layer store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("access denied to layer store {location}: {message}")]
  AccessDenied { location: String, message: String },

  #[error("layer store {location} is unavailable: {message}")]
  StoreUnavailable { location: String, message: String },
}

impl StoreError {
  pub fn access_denied(location: impl Into<String>, message: impl Into<String>) -> Self {
    Self::AccessDenied {
      location: location.into(),
      message: message.into(),
    }
  }

  pub fn unavailable(location: impl Into<String>, message: impl Into<String>) -> Self {
    Self::StoreUnavailable {
      location: location.into(),
      message: message.into(),
    }
  }

  /// Classify an I/O error against a store location.
  pub fn from_io(location: &std::path::Path, err: io::Error) -> Self {
    let location = location.display().to_string();
    match err.kind() {
      io::ErrorKind::PermissionDenied => Self::access_denied(location, err.to_string()),
      _ => Self::unavailable(location, err.to_string()),
    }
  }

  pub fn is_access_denied(&self) -> bool {
    matches!(self, Self::AccessDenied { .. })
  }
}

/// An open, writable layer store.
pub trait LayerStore {
  /// Human-readable location, used in logs and error messages.
  fn location(&self) -> String;

  /// All entries in enumeration order.
  fn entries(&self) -> Result<Vec<LayerEntry>, StoreError>;

  /// Remove the entry keyed by `manifest_path`. Removing an absent key is not an error.
  fn delete(&mut self, manifest_path: &str) -> Result<(), StoreError>;

  /// Set the value for `manifest_path`.
  ///
  /// An absent key is appended at the end of the enumeration order. An existing
  /// key keeps its position.
  fn set(&mut self, manifest_path: &str, value: u32) -> Result<(), StoreError>;

  /// Release the store, flushing anything pending.
  ///
  /// Dropping a store also releases it, but errors are only reported here.
  fn close(self) -> Result<(), StoreError>
  where
    Self: Sized;
}

/// Opens a layer store, creating it on first use.
pub trait StoreOpener {
  type Store: LayerStore;

  fn open_or_create(&self) -> Result<Self::Store, StoreError>;

  /// Read all entries without requiring write access.
  ///
  /// The default opens (and so may create) the store. Backends that can read
  /// without creating override this.
  fn read_entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    let store = self.open_or_create()?;
    let entries = store.entries()?;
    store.close()?;
    Ok(entries)
  }
}

/// Which backend a store opener targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
  /// The machine-wide registry key.
  Registry,
  /// A JSON document at the given path.
  File(PathBuf),
}

impl std::fmt::Display for StoreLocation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Registry => write!(f, r"HKLM\{}", crate::consts::IMPLICIT_LAYERS_KEY),
      Self::File(path) => write!(f, "{}", path.display()),
    }
  }
}
