//! Implicit layer registration.
//!
//! Registration makes this layer's manifest the last entry in the layer store:
//! every existing entry for the same manifest filename is removed, wherever it
//! was installed, and a fresh enabled entry is appended. Since the loader
//! applies layers in enumeration order, this layer then runs after every other
//! implicit layer already on the machine.
//!
//! The work is split into a pure [`LayerRegistrar::plan`] over the current
//! entries and [`LayerRegistrar::register`], which applies that plan to a store.

use std::path::MAIN_SEPARATOR;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::MANIFEST_FILE_NAME;
use crate::entry::{ENABLED, LayerEntry};
use crate::store::{LayerStore, StoreError, StoreOpener};

#[derive(Debug, Error)]
pub enum RegistrationError {
  #[error("invalid install directory: {0:?}")]
  InvalidInstallDirectory(String),

  #[error("invalid assembly path {0:?}: it has no parent directory")]
  InvalidAssemblyPath(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl RegistrationError {
  pub fn is_access_denied(&self) -> bool {
    matches!(self, Self::Store(e) if e.is_access_denied())
  }
}

/// Changes needed to register the layer against a given set of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPlan {
  /// Entries for this manifest that will be deleted, in enumeration order.
  pub removals: Vec<LayerEntry>,
  /// The entry that will be appended.
  pub insert: LayerEntry,
}

impl RegistrationPlan {
  /// The store contents after applying this plan to `entries`.
  pub fn apply_to(&self, entries: &[LayerEntry]) -> Vec<LayerEntry> {
    let mut result: Vec<LayerEntry> = entries
      .iter()
      .filter(|e| !self.removals.iter().any(|r| r.manifest_path == e.manifest_path))
      .cloned()
      .collect();
    result.push(self.insert.clone());
    result
  }

  /// True when the store already matches the plan's outcome.
  pub fn is_noop(&self, entries: &[LayerEntry]) -> bool {
    entries.last() == Some(&self.insert) && self.removals.len() == 1
  }
}

/// Result of a completed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
  pub location: String,
  pub removed: Vec<LayerEntry>,
  pub inserted: LayerEntry,
}

/// Registers one layer's manifest in an implicit layer store.
#[derive(Debug, Clone)]
pub struct LayerRegistrar {
  manifest_name: String,
  separator: char,
}

impl Default for LayerRegistrar {
  fn default() -> Self {
    Self::new(MANIFEST_FILE_NAME)
  }
}

impl LayerRegistrar {
  /// A registrar for the manifest called `manifest_name`, joining paths with the host separator.
  pub fn new(manifest_name: impl Into<String>) -> Self {
    Self {
      manifest_name: manifest_name.into(),
      separator: MAIN_SEPARATOR,
    }
  }

  /// Use `separator` when building manifest paths.
  pub fn with_separator(mut self, separator: char) -> Self {
    self.separator = separator;
    self
  }

  pub fn manifest_name(&self) -> &str {
    &self.manifest_name
  }

  /// Absolute manifest path for a layer installed into `install_dir`.
  ///
  /// Trailing separators on `install_dir` are dropped so the result never
  /// contains a doubled separator. A directory made only of separators (a bare
  /// root) is rejected.
  pub fn manifest_path(&self, install_dir: &str) -> Result<String, RegistrationError> {
    if install_dir
      .trim_matches(|c: char| c.is_whitespace() || c == '\\' || c == '/')
      .is_empty()
    {
      return Err(RegistrationError::InvalidInstallDirectory(install_dir.to_string()));
    }

    let dir = install_dir.trim_end_matches(['\\', '/']);
    Ok(format!("{}{}{}", dir, self.separator, self.manifest_name))
  }

  /// Install directory for the installed assembly at `assembly_path`.
  ///
  /// Installer hooks receive the path of the installed binary rather than the
  /// directory; the manifest sits next to it.
  pub fn install_dir_from_assembly_path(assembly_path: &str) -> Result<String, RegistrationError> {
    // Installers hand over Windows paths even when this runs elsewhere.
    let dir = match assembly_path.trim_end_matches(['\\', '/']).rfind(['\\', '/']) {
      // Directly under the root: the directory is the root itself.
      Some(0) => &assembly_path[..1],
      Some(idx) => &assembly_path[..idx],
      None => "",
    };

    if dir.is_empty() {
      return Err(RegistrationError::InvalidAssemblyPath(assembly_path.to_string()));
    }
    Ok(dir.to_string())
  }

  /// True when `entry` belongs to this layer, wherever it was installed.
  pub fn owns(&self, entry: &LayerEntry) -> bool {
    entry.is_manifest(&self.manifest_name)
  }

  /// Compute the changes registering into `install_dir` makes to `entries`.
  ///
  /// Does not touch any store.
  pub fn plan(&self, install_dir: &str, entries: &[LayerEntry]) -> Result<RegistrationPlan, RegistrationError> {
    let manifest_path = self.manifest_path(install_dir)?;
    let removals = entries.iter().filter(|e| self.owns(e)).cloned().collect();

    Ok(RegistrationPlan {
      removals,
      insert: LayerEntry::new(manifest_path, ENABLED),
    })
  }

  /// Register the layer installed into `install_dir`.
  ///
  /// Opens (creating if needed) the store, deletes every entry for this
  /// manifest, and appends an enabled entry for the new path. Any store failure
  /// aborts the registration; deletions made before the failure stay applied.
  pub fn register<O: StoreOpener>(
    &self,
    opener: &O,
    install_dir: &str,
  ) -> Result<RegistrationOutcome, RegistrationError> {
    let manifest_path = self.manifest_path(install_dir)?;

    let mut store = opener.open_or_create()?;
    let location = store.location();
    let entries = store.entries()?;
    let plan = self.plan(install_dir, &entries)?;

    for stale in &plan.removals {
      debug!(store = %location, manifest = %stale.manifest_path, state = %stale.state(), "removing layer entry");
      store.delete(&stale.manifest_path)?;
    }

    store.set(&manifest_path, ENABLED)?;
    store.close()?;

    info!(
      store = %location,
      manifest = %manifest_path,
      removed = plan.removals.len(),
      "registered implicit layer"
    );

    Ok(RegistrationOutcome {
      location,
      removed: plan.removals,
      inserted: plan.insert,
    })
  }

  /// Describe the store contents with respect to this layer.
  pub fn inspect(&self, entries: &[LayerEntry]) -> LayerReport {
    let layers = entries
      .iter()
      .enumerate()
      .map(|(position, entry)| ReportedEntry {
        position,
        owned: self.owns(entry),
        state: entry.state(),
        entry: entry.clone(),
      })
      .collect();

    LayerReport {
      manifest_name: self.manifest_name.clone(),
      layers,
    }
  }
}

/// One store entry annotated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedEntry {
  pub position: usize,
  pub owned: bool,
  pub state: crate::entry::LayerState,
  #[serde(flatten)]
  pub entry: LayerEntry,
}

/// How the layer currently sits in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationStatus {
  /// No entry for this manifest.
  NotRegistered,
  /// Exactly one entry, enabled and last.
  Registered { manifest_path: String },
  /// Registered, but something will stop it loading last or at all.
  Degraded {
    entries: Vec<String>,
    problems: Vec<String>,
  },
}

/// Store contents as seen by one registrar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReport {
  pub manifest_name: String,
  pub layers: Vec<ReportedEntry>,
}

impl LayerReport {
  pub fn owned(&self) -> impl Iterator<Item = &ReportedEntry> {
    self.layers.iter().filter(|l| l.owned)
  }

  pub fn status(&self) -> RegistrationStatus {
    let owned: Vec<&ReportedEntry> = self.owned().collect();
    let Some(last_owned) = owned.last() else {
      return RegistrationStatus::NotRegistered;
    };

    let mut problems = Vec::new();
    if owned.len() > 1 {
      problems.push(format!("{} entries for {}", owned.len(), self.manifest_name));
    }
    if owned.iter().any(|l| !l.entry.is_enabled()) {
      problems.push("layer is disabled".to_string());
    }
    if last_owned.position + 1 != self.layers.len() {
      problems.push("layer is not last in load order".to_string());
    }

    if problems.is_empty() {
      RegistrationStatus::Registered {
        manifest_path: last_owned.entry.manifest_path.clone(),
      }
    } else {
      RegistrationStatus::Degraded {
        entries: owned.iter().map(|l| l.entry.manifest_path.clone()).collect(),
        problems,
      }
    }
  }

  pub fn is_healthy(&self) -> bool {
    matches!(self.status(), RegistrationStatus::Registered { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::memory::{Fault, MemoryStore, Operation};
  use tracing_test::traced_test;

  fn registrar() -> LayerRegistrar {
    LayerRegistrar::new("X.json").with_separator('\\')
  }

  fn paths(entries: &[LayerEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.manifest_path.as_str()).collect()
  }

  #[test]
  fn manifest_path_joins_with_separator() {
    let r = registrar();
    assert_eq!(r.manifest_path(r"C:\New").unwrap(), r"C:\New\X.json");
    assert_eq!(r.manifest_path(r"C:\New\").unwrap(), r"C:\New\X.json");
    assert_eq!(r.manifest_path(r"C:\New\\").unwrap(), r"C:\New\X.json");
  }

  #[test]
  fn separator_only_install_dir_is_rejected_before_opening_store() {
    for dir in ["/", "\\", "\\\\", " / ", "/\\"] {
      let store = MemoryStore::new();
      let err = registrar().register(&store, dir).unwrap_err();

      assert!(matches!(err, RegistrationError::InvalidInstallDirectory(_)), "{dir:?}");
      assert!(!store.exists(), "{dir:?}");
    }
  }

  #[test]
  fn empty_install_dir_is_rejected_before_opening_store() {
    let store = MemoryStore::new();
    let err = registrar().register(&store, "  ").unwrap_err();

    assert!(matches!(err, RegistrationError::InvalidInstallDirectory(_)));
    assert!(!store.exists());
  }

  #[test]
  fn install_dir_from_assembly_path_strips_file_name() {
    assert_eq!(
      LayerRegistrar::install_dir_from_assembly_path(r"C:\Program Files\Layer\SetupActions.dll").unwrap(),
      r"C:\Program Files\Layer"
    );
    assert_eq!(
      LayerRegistrar::install_dir_from_assembly_path("/opt/layer/setup.so").unwrap(),
      "/opt/layer"
    );
    assert!(matches!(
      LayerRegistrar::install_dir_from_assembly_path("setup.dll"),
      Err(RegistrationError::InvalidAssemblyPath(_))
    ));
  }

  #[test]
  fn assembly_at_root_yields_root_directory() {
    assert_eq!(LayerRegistrar::install_dir_from_assembly_path("/setup.so").unwrap(), "/");
    assert_eq!(
      LayerRegistrar::install_dir_from_assembly_path(r"\SetupActions.dll").unwrap(),
      r"\"
    );
    assert_eq!(
      LayerRegistrar::install_dir_from_assembly_path(r"C:\SetupActions.dll").unwrap(),
      "C:"
    );

    // A bare root is still not somewhere a layer can be registered.
    assert!(matches!(
      registrar().manifest_path("/"),
      Err(RegistrationError::InvalidInstallDirectory(_))
    ));
  }

  #[test]
  fn replaces_stale_entry_and_keeps_foreign_layers() {
    let store = MemoryStore::with_entries([
      LayerEntry::new(r"C:\A\layer.json", 0),
      LayerEntry::new(r"C:\Old\X.json", 1),
    ]);

    let outcome = registrar().register(&store, r"C:\New").unwrap();

    assert_eq!(
      store.snapshot(),
      vec![LayerEntry::new(r"C:\A\layer.json", 0), LayerEntry::new(r"C:\New\X.json", 0)]
    );
    assert_eq!(paths(&outcome.removed), vec![r"C:\Old\X.json"]);
    assert_eq!(outcome.inserted, LayerEntry::enabled(r"C:\New\X.json"));
  }

  #[test]
  fn registering_twice_is_idempotent() {
    let store = MemoryStore::with_entries([LayerEntry::new(r"C:\A\layer.json", 0)]);
    let r = registrar();

    r.register(&store, r"C:\Layer").unwrap();
    let once = store.snapshot();
    r.register(&store, r"C:\Layer").unwrap();

    assert_eq!(store.snapshot(), once);
    assert_eq!(r.inspect(&store.snapshot()).owned().count(), 1);
  }

  #[test]
  fn moving_install_dir_leaves_single_entry() {
    let store = MemoryStore::new();
    let r = registrar();

    r.register(&store, r"C:\A").unwrap();
    r.register(&store, r"D:\B").unwrap();

    assert_eq!(store.snapshot(), vec![LayerEntry::enabled(r"D:\B\X.json")]);
  }

  #[test]
  fn reinstall_at_same_path_moves_entry_last() {
    let store = MemoryStore::with_entries([
      LayerEntry::new(r"C:\Layer\X.json", 0),
      LayerEntry::new(r"C:\Toolkit\toolkit.json", 0),
      LayerEntry::new(r"C:\Other\other.json", 1),
    ]);

    registrar().register(&store, r"C:\Layer").unwrap();

    assert_eq!(
      paths(&store.snapshot()),
      vec![r"C:\Toolkit\toolkit.json", r"C:\Other\other.json", r"C:\Layer\X.json"]
    );
  }

  #[test]
  fn removes_every_duplicate() {
    let store = MemoryStore::with_entries([
      LayerEntry::new(r"C:\One\X.json", 0),
      LayerEntry::new(r"C:\A\layer.json", 0),
      LayerEntry::new("D:/Two/X.json", 1),
      LayerEntry::new("X.json", 0),
    ]);

    let outcome = registrar().register(&store, r"C:\Three").unwrap();

    assert_eq!(outcome.removed.len(), 3);
    assert_eq!(paths(&store.snapshot()), vec![r"C:\A\layer.json", r"C:\Three\X.json"]);
  }

  #[test]
  fn never_touches_other_layers() {
    let foreign = vec![
      LayerEntry::new(r"C:\A\MyX.json", 1),
      LayerEntry::new(r"C:\X.json\layer.json", 0),
      LayerEntry::new(r"C:\B\x.json", 0),
    ];
    let store = MemoryStore::with_entries(foreign.clone());

    registrar().register(&store, r"C:\Layer").unwrap();

    let after = store.snapshot();
    assert_eq!(&after[..3], &foreign[..]);
    assert_eq!(after[3], LayerEntry::enabled(r"C:\Layer\X.json"));
  }

  #[test]
  fn creates_store_on_first_registration() {
    let store = MemoryStore::new();

    registrar().register(&store, r"C:\Layer").unwrap();

    assert!(store.exists());
    assert_eq!(store.snapshot(), vec![LayerEntry::enabled(r"C:\Layer\X.json")]);
    assert_eq!(store.open_handles(), 0);
  }

  #[test]
  fn access_denied_on_open_leaves_store_untouched() {
    let before = vec![LayerEntry::new(r"C:\Old\X.json", 0)];
    let store = MemoryStore::with_entries(before.clone());
    store.fail_on(Operation::Open, Fault::AccessDenied);

    let err = registrar().register(&store, r"C:\New").unwrap_err();

    assert!(err.is_access_denied());
    assert_eq!(store.snapshot(), before);
  }

  #[test]
  fn set_failure_propagates_after_deletions() {
    let store = MemoryStore::with_entries([
      LayerEntry::new(r"C:\A\layer.json", 0),
      LayerEntry::new(r"C:\Old\X.json", 0),
    ]);
    store.fail_on(Operation::Set, Fault::Unavailable);

    let err = registrar().register(&store, r"C:\New").unwrap_err();

    assert!(matches!(err, RegistrationError::Store(StoreError::StoreUnavailable { .. })));
    assert_eq!(store.snapshot(), vec![LayerEntry::new(r"C:\A\layer.json", 0)]);
    assert_eq!(store.open_handles(), 0);
  }

  #[test]
  fn close_failure_is_reported() {
    let store = MemoryStore::new();
    store.fail_on(Operation::Close, Fault::Unavailable);

    assert!(registrar().register(&store, r"C:\New").is_err());
  }

  #[test]
  fn plan_matches_register() {
    let entries = vec![
      LayerEntry::new(r"C:\A\layer.json", 0),
      LayerEntry::new(r"C:\Old\X.json", 1),
      LayerEntry::new(r"C:\B\other.json", 0),
    ];
    let r = registrar();
    let plan = r.plan(r"C:\New", &entries).unwrap();

    let store = MemoryStore::with_entries(entries.clone());
    r.register(&store, r"C:\New").unwrap();

    assert_eq!(plan.apply_to(&entries), store.snapshot());
    assert!(!plan.is_noop(&entries));
    assert!(r.plan(r"C:\New", &store.snapshot()).unwrap().is_noop(&store.snapshot()));
  }

  #[test]
  #[traced_test]
  fn logs_registration() {
    let store = MemoryStore::new();
    registrar().register(&store, r"C:\Layer").unwrap();
    assert!(logs_contain("registered implicit layer"));
  }

  #[test]
  fn status_reflects_store_contents() {
    let r = registrar();

    assert_eq!(r.inspect(&[]).status(), RegistrationStatus::NotRegistered);

    let healthy = r.inspect(&[LayerEntry::enabled(r"C:\A\a.json"), LayerEntry::enabled(r"C:\L\X.json")]);
    assert!(healthy.is_healthy());

    let not_last = r.inspect(&[LayerEntry::enabled(r"C:\L\X.json"), LayerEntry::enabled(r"C:\A\a.json")]);
    match not_last.status() {
      RegistrationStatus::Degraded { problems, .. } => {
        assert_eq!(problems, vec!["layer is not last in load order".to_string()])
      }
      other => panic!("unexpected status: {:?}", other),
    }

    let duplicated = r.inspect(&[LayerEntry::new(r"C:\Old\X.json", 1), LayerEntry::enabled(r"C:\L\X.json")]);
    match duplicated.status() {
      RegistrationStatus::Degraded { entries, problems } => {
        assert_eq!(entries.len(), 2);
        assert_eq!(problems.len(), 2);
      }
      other => panic!("unexpected status: {:?}", other),
    }
  }
}
