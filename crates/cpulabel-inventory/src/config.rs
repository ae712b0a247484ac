//! Inventory configuration

use cpulabel_core::{Error, Node, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Inventory backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryBackend {
    /// In-process store seeded from `nodes`
    Memory,
    /// YAML document at `path`
    File,
}

/// Inventory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Backend to use
    pub backend: InventoryBackend,

    /// Inventory file for the file backend
    pub path: Option<PathBuf>,

    /// Initial nodes for the memory backend
    pub nodes: Vec<Node>,
}

impl InventoryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            InventoryBackend::File if self.path.is_none() => {
                Err(Error::config("File inventory requires a path"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            backend: InventoryBackend::File,
            path: Some(PathBuf::from("/var/lib/cpulabel/nodes.yaml")),
            nodes: Vec::new(),
        }
    }
}
