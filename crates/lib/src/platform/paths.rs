use crate::consts::{APP_NAME, FILE_STORE_NAME};
use std::path::PathBuf;

/// Machine-wide data directory for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  let program_data = std::env::var("PROGRAMDATA").unwrap_or_else(|_| r"C:\ProgramData".to_string());
  PathBuf::from(program_data).join(APP_NAME)
}

/// Data directory for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
    .unwrap_or_else(|_| PathBuf::from("/var/lib"));
  data_home.join(APP_NAME)
}

/// Default location of the JSON layer store
pub fn default_file_store() -> PathBuf {
  data_dir().join(FILE_STORE_NAME)
}
