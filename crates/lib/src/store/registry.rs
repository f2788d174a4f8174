//! Registry-backed layer store.
//!
//! The OpenXR loader enumerates the values of
//! `HKEY_LOCAL_MACHINE\SOFTWARE\Khronos\OpenXR\1\ApiLayers\Implicit`: each value
//! name is a manifest path and each value is a `REG_DWORD` flag. Values are
//! enumerated in creation order, which is what lets a freshly written value
//! load after every existing layer.
//!
//! The 64-bit registry view is always used so a 32-bit installer host writes
//! where the 64-bit loader looks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use tracing::debug;
use windows_sys::Win32::Foundation::{
  ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS, WIN32_ERROR,
};
use windows_sys::Win32::System::Registry::{
  HKEY, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_64KEY, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE,
  REG_VALUE_TYPE, RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegEnumValueW, RegOpenKeyExW,
  RegQueryValueExW, RegSetValueExW,
};

use super::{LayerStore, StoreError, StoreOpener};
use crate::consts::IMPLICIT_LAYERS_KEY;
use crate::entry::{DISABLED, LayerEntry};

/// Longest value name the registry allows, plus the terminator.
const MAX_VALUE_NAME: usize = 16_384;

/// Opener for the machine-wide implicit layer key.
#[derive(Debug, Clone)]
pub struct RegistryStore {
  subkey: String,
}

impl RegistryStore {
  /// The standard OpenXR implicit layer key.
  pub fn new() -> Self {
    Self {
      subkey: IMPLICIT_LAYERS_KEY.to_string(),
    }
  }

  fn location(&self) -> String {
    format!(r"HKLM\{}", self.subkey)
  }
}

impl Default for RegistryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl StoreOpener for RegistryStore {
  type Store = RegistryHandle;

  fn open_or_create(&self) -> Result<RegistryHandle, StoreError> {
    let subkey = wide(&self.subkey);
    let mut hkey: HKEY = ptr::null_mut();

    // SAFETY: `subkey` is a NUL-terminated UTF-16 buffer that outlives the call
    // and `hkey` is a valid out pointer.
    let status = unsafe {
      RegCreateKeyExW(
        HKEY_LOCAL_MACHINE,
        subkey.as_ptr(),
        0,
        ptr::null(),
        REG_OPTION_NON_VOLATILE,
        KEY_READ | KEY_WRITE | KEY_WOW64_64KEY,
        ptr::null(),
        &mut hkey,
        ptr::null_mut(),
      )
    };
    check(status, &self.location(), "open")?;

    debug!(key = %self.location(), "opened layer registry key");
    Ok(RegistryHandle::new(hkey, self.location()))
  }

  /// Reads with `KEY_READ` only, so listing works without elevation.
  /// A missing key reads as empty.
  fn read_entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    let subkey = wide(&self.subkey);
    let mut hkey: HKEY = ptr::null_mut();

    // SAFETY: as in `open_or_create`.
    let status = unsafe {
      RegOpenKeyExW(
        HKEY_LOCAL_MACHINE,
        subkey.as_ptr(),
        0,
        KEY_READ | KEY_WOW64_64KEY,
        &mut hkey,
      )
    };
    if status == ERROR_FILE_NOT_FOUND {
      return Ok(Vec::new());
    }
    check(status, &self.location(), "open")?;

    let handle = RegistryHandle::new(hkey, self.location());
    let entries = handle.entries()?;
    handle.close()?;
    Ok(entries)
  }
}

/// Raw UTF-16 value names from the last enumeration, keyed by their decoded form.
///
/// Names that are not valid UTF-16 decode lossily, so deleting by the decoded
/// name would miss the real value. Deletes go through the raw names instead.
#[derive(Debug, Default)]
struct ValueNames(HashMap<String, Vec<Vec<u16>>>);

impl ValueNames {
  /// Remember `raw` and return its decoded name.
  fn record(&mut self, raw: &[u16]) -> String {
    let name = String::from_utf16_lossy(raw);
    self.0.entry(name.clone()).or_default().push(raw.to_vec());
    name
  }

  /// NUL-terminated names to pass to the registry for `name`.
  ///
  /// Every raw name that decoded to `name` is returned; a name never
  /// enumerated is encoded directly.
  fn take(&mut self, name: &str) -> Vec<Vec<u16>> {
    match self.0.remove(name) {
      Some(raw) => raw.iter().map(|r| nul_terminated(r)).collect(),
      None => vec![wide(name)],
    }
  }
}

/// An open registry key.
#[derive(Debug)]
pub struct RegistryHandle {
  hkey: HKEY,
  location: String,
  names: RefCell<ValueNames>,
}

impl RegistryHandle {
  fn new(hkey: HKEY, location: String) -> Self {
    Self {
      hkey,
      location,
      names: RefCell::new(ValueNames::default()),
    }
  }

  /// Raw value names in enumeration order, without terminators.
  fn value_names(&self) -> Result<Vec<Vec<u16>>, StoreError> {
    let mut names = Vec::new();
    let mut buf = vec![0u16; MAX_VALUE_NAME];

    for index in 0u32.. {
      let mut len = buf.len() as u32;
      // SAFETY: `buf` holds `len` u16s; the data pointers are null so only the name is returned.
      let status = unsafe {
        RegEnumValueW(
          self.hkey,
          index,
          buf.as_mut_ptr(),
          &mut len,
          ptr::null(),
          ptr::null_mut(),
          ptr::null_mut(),
          ptr::null_mut(),
        )
      };
      if status == ERROR_NO_MORE_ITEMS {
        break;
      }
      check(status, &self.location, "enumerate")?;
      names.push(buf[..len as usize].to_vec());
    }

    Ok(names)
  }

  /// DWORD data of the value called `name`, a NUL-terminated UTF-16 name.
  fn dword(&self, name: &[u16]) -> Result<u32, StoreError> {
    let mut kind: REG_VALUE_TYPE = 0;
    let mut data = [0u8; 4];
    let mut size = data.len() as u32;

    // SAFETY: `name` is NUL-terminated; `data` holds `size` bytes.
    let status = unsafe {
      RegQueryValueExW(
        self.hkey,
        name.as_ptr(),
        ptr::null(),
        &mut kind,
        data.as_mut_ptr(),
        &mut size,
      )
    };

    // Anything that is not a plain DWORD is not "0", so the loader skips it.
    if status == ERROR_MORE_DATA {
      return Ok(DISABLED);
    }
    check(status, &self.location, "read value")?;
    if kind != REG_DWORD || size != 4 {
      return Ok(DISABLED);
    }
    Ok(u32::from_le_bytes(data))
  }
}

impl LayerStore for RegistryHandle {
  fn location(&self) -> String {
    self.location.clone()
  }

  fn entries(&self) -> Result<Vec<LayerEntry>, StoreError> {
    let mut names = ValueNames::default();
    let mut entries = Vec::new();
    for raw in self.value_names()? {
      let value = self.dword(&nul_terminated(&raw))?;
      entries.push(LayerEntry::new(names.record(&raw), value));
    }
    self.names.replace(names);
    Ok(entries)
  }

  fn delete(&mut self, manifest_path: &str) -> Result<(), StoreError> {
    for name in self.names.get_mut().take(manifest_path) {
      // SAFETY: `name` is NUL-terminated and the key handle is open.
      let status = unsafe { RegDeleteValueW(self.hkey, name.as_ptr()) };
      if status == ERROR_FILE_NOT_FOUND {
        continue;
      }
      check(status, &self.location, "delete value")?;
    }
    Ok(())
  }

  fn set(&mut self, manifest_path: &str, value: u32) -> Result<(), StoreError> {
    let name = wide(manifest_path);
    let data = value.to_le_bytes();
    // SAFETY: `name` is NUL-terminated and `data` holds exactly 4 bytes.
    let status = unsafe {
      RegSetValueExW(
        self.hkey,
        name.as_ptr(),
        0,
        REG_DWORD,
        data.as_ptr(),
        data.len() as u32,
      )
    };
    check(status, &self.location, "set value")
  }

  fn close(mut self) -> Result<(), StoreError> {
    let hkey = std::mem::replace(&mut self.hkey, ptr::null_mut());
    // SAFETY: `hkey` came from RegCreateKeyExW and is closed exactly once.
    let status = unsafe { RegCloseKey(hkey) };
    check(status, &self.location, "close")
  }
}

impl Drop for RegistryHandle {
  fn drop(&mut self) {
    if !self.hkey.is_null() {
      // SAFETY: the handle is still open; `close` nulls it out after closing.
      unsafe {
        RegCloseKey(self.hkey);
      }
    }
  }
}

fn wide(s: &str) -> Vec<u16> {
  OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

fn nul_terminated(raw: &[u16]) -> Vec<u16> {
  raw.iter().copied().chain(std::iter::once(0)).collect()
}

fn check(status: WIN32_ERROR, location: &str, action: &str) -> Result<(), StoreError> {
  if status == ERROR_SUCCESS {
    return Ok(());
  }
  let message = format!(
    "{} failed: {}",
    action,
    std::io::Error::from_raw_os_error(status as i32)
  );
  if status == ERROR_ACCESS_DENIED {
    Err(StoreError::access_denied(location, message))
  } else {
    Err(StoreError::unavailable(location, message))
  }
}
