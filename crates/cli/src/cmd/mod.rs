mod list;
mod plan;
mod register;
mod status;

pub use list::cmd_list;
pub use plan::cmd_plan;
pub use register::cmd_register;
pub use status::cmd_status;

use anyhow::{Context, Result};

use layerreg_lib::Config;
use layerreg_lib::store::any::AnyStore;

/// Store opener for the configured backend.
fn open_store(config: &Config) -> Result<AnyStore> {
  AnyStore::for_location(&config.store).with_context(|| format!("Cannot use layer store {}", config.store))
}
