//! JSON-file layer store.
//!
//! Stands in for the registry on hosts without one, and for staging a layer
//! list before it is applied to a machine.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "layers": [
//!     { "manifest_path": "C:\\A\\layer.json", "value": 0 }
//!   ]
//! }
//! ```
//!
//! Array order is enumeration order. Every mutation re-reads the document and
//! writes it back atomically (temp file, then rename), so each operation is
//! individually serialized the way registry calls are.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LayerStore, StoreError, StoreOpener};
use crate::entry::LayerEntry;

pub const FILE_STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Document {
  version: u32,
  #[serde(default)]
  layers: Vec<LayerEntry>,
}

impl Document {
  fn empty() -> Self {
    Self {
      version: FILE_STORE_VERSION,
      layers: Vec::new(),
    }
  }
}

/// Opener for a JSON-file store.
#[derive(Debug, Clone)]
pub struct FileStore {
  path: PathBuf,
}

impl FileStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl StoreOpener for FileStore {
  type Store = FileHandle;

  /// Returns an empty list if the file doesn't exist, without creating it.
  fn read_entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    Ok(load(&self.path)?.map(|doc| doc.layers).unwrap_or_default())
  }

  fn open_or_create(&self) -> Result<FileHandle, StoreError> {
    if load(&self.path)?.is_none() {
      debug!(path = %self.path.display(), "creating layer store");
      if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::from_io(parent, e))?;
      }
      save(&self.path, &Document::empty())?;
    }

    Ok(FileHandle {
      path: self.path.clone(),
    })
  }
}

/// An open JSON-file store.
#[derive(Debug)]
pub struct FileHandle {
  path: PathBuf,
}

impl FileHandle {
  fn modify(&self, f: impl FnOnce(&mut Vec<LayerEntry>)) -> Result<(), StoreError> {
    let mut doc = load(&self.path)?
      .ok_or_else(|| StoreError::unavailable(self.path.display().to_string(), "store file disappeared"))?;
    f(&mut doc.layers);
    save(&self.path, &doc)
  }
}

impl LayerStore for FileHandle {
  fn location(&self) -> String {
    self.path.display().to_string()
  }

  fn entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    Ok(load(&self.path)?.map(|doc| doc.layers).unwrap_or_default())
  }

  fn delete(&mut self, manifest_path: &str) -> Result<(), StoreError> {
    self.modify(|layers| layers.retain(|e| e.manifest_path != manifest_path))
  }

  fn set(&mut self, manifest_path: &str, value: u32) -> Result<(), StoreError> {
    self.modify(|layers| match layers.iter_mut().find(|e| e.manifest_path == manifest_path) {
      Some(existing) => existing.value = value,
      None => layers.push(LayerEntry::new(manifest_path, value)),
    })
  }

  fn close(self) -> Result<(), StoreError> {
    // Every mutation is already on disk.
    Ok(())
  }
}

/// Load the document, or `None` if the file doesn't exist.
fn load(path: &Path) -> Result<Option<Document>, StoreError> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(StoreError::from_io(path, e)),
  };

  let doc: Document = serde_json::from_str(&content)
    .map_err(|e| StoreError::unavailable(path.display().to_string(), format!("corrupt store: {}", e)))?;

  if doc.version != FILE_STORE_VERSION {
    return Err(StoreError::unavailable(
      path.display().to_string(),
      format!("unsupported store version {}", doc.version),
    ));
  }

  Ok(Some(doc))
}

fn save(path: &Path, doc: &Document) -> Result<(), StoreError> {
  let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  temp_name.push(".tmp");
  let temp_path = path.with_file_name(temp_name);

  let content = serde_json::to_string_pretty(doc)
    .map_err(|e| StoreError::unavailable(path.display().to_string(), e.to_string()))?;
  fs::write(&temp_path, content).map_err(|e| StoreError::from_io(&temp_path, e))?;
  fs::rename(&temp_path, path).map_err(|e| StoreError::from_io(path, e))?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn open_creates_missing_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("layers.json");
    let store = FileStore::new(&path);

    let handle = store.open_or_create().unwrap();
    assert!(path.exists());
    assert!(handle.entries().unwrap().is_empty());
  }

  #[test]
  fn read_entries_does_not_create() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("layers.json"));

    assert!(store.read_entries().unwrap().is_empty());
    assert!(!store.path().exists());
  }

  #[test]
  fn mutations_persist_in_order() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("layers.json"));

    let mut handle = store.open_or_create().unwrap();
    handle.set(r"C:\A\layer.json", 0).unwrap();
    handle.set(r"C:\B\X.json", 1).unwrap();
    handle.delete(r"C:\A\layer.json").unwrap();
    handle.set(r"C:\A\layer.json", 0).unwrap();
    handle.close().unwrap();

    let reopened = store.open_or_create().unwrap();
    assert_eq!(
      reopened.entries().unwrap(),
      vec![LayerEntry::new(r"C:\B\X.json", 1), LayerEntry::new(r"C:\A\layer.json", 0)]
    );
    assert!(!temp.path().join("layers.json.tmp").exists());
  }

  #[test]
  fn corrupt_file_is_unavailable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("layers.json");
    fs::write(&path, "{ not json").unwrap();

    let err = FileStore::new(&path).open_or_create().unwrap_err();
    assert!(matches!(err, StoreError::StoreUnavailable { .. }));
  }

  #[test]
  fn unknown_version_is_unavailable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("layers.json");
    fs::write(&path, r#"{ "version": 99, "layers": [] }"#).unwrap();

    let err = FileStore::new(&path).open_or_create().unwrap_err();
    assert!(err.to_string().contains("unsupported store version 99"));
  }

  #[cfg(unix)]
  #[test]
  fn read_only_directory_is_access_denied() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("locked");
    fs::create_dir(&dir).unwrap();
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

    // Root ignores permission bits.
    if fs::write(dir.join("write-check"), "").is_ok() {
      return;
    }

    let err = FileStore::new(dir.join("layers.json")).open_or_create().unwrap_err();
    assert!(err.is_access_denied(), "unexpected error: {}", err);

    fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
  }
}
