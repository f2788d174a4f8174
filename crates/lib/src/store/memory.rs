//! In-memory layer store.
//!
//! Keeps entries in insertion order like the registry does. Clones share the
//! same underlying state, so a test can hand one clone to the registrar and
//! inspect the result through another. Individual operations can be made to
//! fail to exercise error paths.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{LayerStore, StoreError, StoreOpener};
use crate::entry::LayerEntry;

const LOCATION: &str = "memory";

/// An operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Open,
  Enumerate,
  Delete,
  Set,
  Close,
}

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  AccessDenied,
  Unavailable,
}

impl Fault {
  fn to_error(self, op: Operation) -> StoreError {
    let message = format!("injected failure during {:?}", op);
    match self {
      Fault::AccessDenied => StoreError::access_denied(LOCATION, message),
      Fault::Unavailable => StoreError::unavailable(LOCATION, message),
    }
  }
}

#[derive(Debug, Default)]
struct State {
  created: bool,
  entries: Vec<LayerEntry>,
  faults: Vec<(Operation, Fault)>,
  open_handles: usize,
}

/// Opener for an in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<State>>,
}

impl MemoryStore {
  /// A store that does not exist yet; the first open creates it.
  pub fn new() -> Self {
    Self::default()
  }

  /// An existing store holding `entries` in the given order.
  pub fn with_entries(entries: impl IntoIterator<Item = LayerEntry>) -> Self {
    let store = Self::new();
    {
      let mut state = store.lock();
      state.created = true;
      state.entries = entries.into_iter().collect();
    }
    store
  }

  /// Make every future `op` fail with `fault`.
  pub fn fail_on(&self, op: Operation, fault: Fault) {
    self.lock().faults.push((op, fault));
  }

  /// Current entries in enumeration order.
  pub fn snapshot(&self) -> Vec<LayerEntry> {
    self.lock().entries.clone()
  }

  /// Whether the store has been created.
  pub fn exists(&self) -> bool {
    self.lock().created
  }

  /// Number of handles opened and not yet closed or dropped.
  pub fn open_handles(&self) -> usize {
    self.lock().open_handles
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    // A poisoned lock only means a test panicked mid-operation; the data is still usable.
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl StoreOpener for MemoryStore {
  type Store = MemoryHandle;

  fn open_or_create(&self) -> Result<MemoryHandle, StoreError> {
    {
      let mut state = self.lock();
      check(&state, Operation::Open)?;
      state.created = true;
      state.open_handles += 1;
    }
    Ok(MemoryHandle {
      store: self.clone(),
      released: false,
    })
  }
}

/// An open in-memory store.
#[derive(Debug)]
pub struct MemoryHandle {
  store: MemoryStore,
  released: bool,
}

impl MemoryHandle {
  fn release(&mut self) {
    if !self.released {
      self.released = true;
      let mut state = self.store.lock();
      state.open_handles = state.open_handles.saturating_sub(1);
    }
  }
}

impl LayerStore for MemoryHandle {
  fn location(&self) -> String {
    LOCATION.to_string()
  }

  fn entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    let state = self.store.lock();
    check(&state, Operation::Enumerate)?;
    Ok(state.entries.clone())
  }

  fn delete(&mut self, manifest_path: &str) -> Result<(), StoreError> {
    let mut state = self.store.lock();
    check(&state, Operation::Delete)?;
    state.entries.retain(|e| e.manifest_path != manifest_path);
    Ok(())
  }

  fn set(&mut self, manifest_path: &str, value: u32) -> Result<(), StoreError> {
    let mut state = self.store.lock();
    check(&state, Operation::Set)?;
    match state.entries.iter_mut().find(|e| e.manifest_path == manifest_path) {
      Some(existing) => existing.value = value,
      None => state.entries.push(LayerEntry::new(manifest_path, value)),
    }
    Ok(())
  }

  fn close(mut self) -> Result<(), StoreError> {
    let result = check(&self.store.lock(), Operation::Close);
    self.release();
    result
  }
}

impl Drop for MemoryHandle {
  fn drop(&mut self) {
    self.release();
  }
}

fn check(state: &State, op: Operation) -> Result<(), StoreError> {
  match state.faults.iter().find(|(o, _)| *o == op) {
    Some((_, fault)) => Err(fault.to_error(op)),
    None => Ok(()),
  }
}
