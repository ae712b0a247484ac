//! # cpulabel-inventory
//!
//! Node inventory stores for cpulabel.
//!
//! Both stores implement [`cpulabel_core::NodeInventory`] with the same
//! optimistic concurrency rule: an update carries the resource version it was
//! read at, and a stale version is rejected rather than merged.
//!
//! - [`MemoryInventory`]: in-process store, used in tests and by the daemon's
//!   memory backend
//! - [`FileInventory`]: YAML document on disk, rewritten atomically per update

pub mod config;
pub mod file;
pub mod memory;

pub use config::{InventoryBackend, InventoryConfig};
pub use file::{FileInventory, InventoryDocument};
pub use memory::{InventoryStats, MemoryInventory};

use cpulabel_core::{Error, NodeInventory, Result};
use std::sync::Arc;

/// Build the inventory selected by `config.backend`
pub fn build_inventory(config: &InventoryConfig) -> Result<Arc<dyn NodeInventory>> {
    config.validate()?;

    match config.backend {
        InventoryBackend::Memory => Ok(Arc::new(MemoryInventory::with_nodes(
            config.nodes.iter().cloned(),
        ))),
        InventoryBackend::File => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| Error::config("File inventory requires a path"))?;
            Ok(Arc::new(FileInventory::new(path)))
        }
    }
}
