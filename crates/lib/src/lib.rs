//! layerreg-lib: implicit API layer registration
//!
//! This crate registers an OpenXR implicit layer with the loader's
//! machine-wide layer list:
//! - `LayerRegistrar`: computes the manifest path and rewrites the list so the
//!   layer appears exactly once, enabled, and last
//! - `LayerStore` / `StoreOpener`: access to the ordered layer list, backed by
//!   the registry, a JSON file, or memory
//! - `Config`: backend and manifest selection

pub mod config;
pub mod consts;
pub mod entry;
pub mod platform;
pub mod registrar;
pub mod store;

pub use config::Config;
pub use entry::{LayerEntry, LayerState};
pub use registrar::{LayerRegistrar, RegistrationError, RegistrationOutcome, RegistrationPlan, RegistrationStatus};
pub use store::{LayerStore, StoreError, StoreLocation, StoreOpener};
