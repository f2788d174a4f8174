pub mod paths;

use crate::store::StoreLocation;

/// Whether the machine-wide registry backend exists on this host
pub const fn has_registry() -> bool {
  cfg!(windows)
}

/// Store backend used when nothing is configured
///
/// The registry on Windows, a JSON file in the data directory elsewhere.
pub fn default_store_location() -> StoreLocation {
  if has_registry() {
    StoreLocation::Registry
  } else {
    StoreLocation::File(paths::default_file_store())
  }
}
