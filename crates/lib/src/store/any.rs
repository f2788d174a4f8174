//! Backend chosen at runtime from a [`StoreLocation`].

use super::file::{FileHandle, FileStore};
#[cfg(windows)]
use super::registry::{RegistryHandle, RegistryStore};
use super::{LayerStore, StoreError, StoreLocation, StoreOpener};
use crate::entry::LayerEntry;

#[derive(Debug, Clone)]
pub enum AnyStore {
  File(FileStore),
  #[cfg(windows)]
  Registry(RegistryStore),
}

impl AnyStore {
  /// Opener for `location`.
  ///
  /// Fails with `StoreUnavailable` when asked for the registry on a host without one.
  pub fn for_location(location: &StoreLocation) -> Result<Self, StoreError> {
    match location {
      StoreLocation::File(path) => Ok(Self::File(FileStore::new(path))),
      #[cfg(windows)]
      StoreLocation::Registry => Ok(Self::Registry(RegistryStore::new())),
      #[cfg(not(windows))]
      StoreLocation::Registry => Err(StoreError::unavailable(
        location.to_string(),
        "the registry is only available on Windows; pass --store to use a file",
      )),
    }
  }
}

impl StoreOpener for AnyStore {
  type Store = AnyHandle;

  fn open_or_create(&self) -> Result<AnyHandle, StoreError> {
    match self {
      Self::File(s) => s.open_or_create().map(AnyHandle::File),
      #[cfg(windows)]
      Self::Registry(s) => s.open_or_create().map(AnyHandle::Registry),
    }
  }

  fn read_entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    match self {
      Self::File(s) => s.read_entries(),
      #[cfg(windows)]
      Self::Registry(s) => s.read_entries(),
    }
  }
}

#[derive(Debug)]
pub enum AnyHandle {
  File(FileHandle),
  #[cfg(windows)]
  Registry(RegistryHandle),
}

impl LayerStore for AnyHandle {
  fn location(&self) -> String {
    match self {
      Self::File(h) => h.location(),
      #[cfg(windows)]
      Self::Registry(h) => h.location(),
    }
  }

  fn entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    match self {
      Self::File(h) => h.entries(),
      #[cfg(windows)]
      Self::Registry(h) => h.entries(),
    }
  }

  fn delete(&mut self, manifest_path: &str) -> Result<(), StoreError> {
    match self {
      Self::File(h) => h.delete(manifest_path),
      #[cfg(windows)]
      Self::Registry(h) => h.delete(manifest_path),
    }
  }

  fn set(&mut self, manifest_path: &str, value: u32) -> Result<(), StoreError> {
    match self {
      Self::File(h) => h.set(manifest_path, value),
      #[cfg(windows)]
      Self::Registry(h) => h.set(manifest_path, value),
    }
  }

  fn close(self) -> Result<(), StoreError> {
    match self {
      Self::File(h) => h.close(),
      #[cfg(windows)]
      Self::Registry(h) => h.close(),
    }
  }
}
