//! File-backed node inventory
//!
//! The inventory is a YAML document:
//!
//! ```yaml
//! nodes:
//!   - name: worker-1
//!     labels:
//!       cpu-speed: fast
//!     resourceVersion: 3
//! ```
//!
//! Every `list` re-reads the file. Every `update` re-reads, checks the
//! resource version, and replaces the file through a rename so readers never
//! see a partial write.

use async_trait::async_trait;
use cpulabel_core::{Error, Node, NodeInventory, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// On-disk inventory document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Node inventory stored in a YAML file
#[derive(Debug)]
pub struct FileInventory {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the document
    pub async fn load(&self) -> Result<InventoryDocument> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(InventoryDocument::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Replace the document on disk
    pub async fn store(&self, document: &InventoryDocument) -> Result<()> {
        let content = serde_yaml::to_string(document)?;
        let tmp_path = self.temp_path();

        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "nodes.yaml".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl NodeInventory for FileInventory {
    async fn list(&self) -> Result<Vec<Node>> {
        let document = self.load().await.map_err(|e| {
            Error::unavailable(format!("reading {}: {}", self.path.display(), e))
        })?;
        Ok(document.nodes)
    }

    async fn update(&self, node: &Node) -> Result<Node> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.load().await?;
        let stored = document
            .nodes
            .iter_mut()
            .find(|n| n.name == node.name)
            .ok_or_else(|| Error::not_found(format!("node {}", node.name)))?;

        if stored.resource_version != node.resource_version {
            return Err(Error::conflict(format!(
                "node {} is at resource version {}, update was based on {}",
                node.name, stored.resource_version, node.resource_version
            )));
        }

        let mut updated = node.clone();
        updated.resource_version = stored.resource_version + 1;
        *stored = updated.clone();

        self.store(&document).await?;
        debug!(
            "Wrote node {} (resource version {}) to {}",
            updated.name,
            updated.resource_version,
            self.path.display()
        );
        Ok(updated)
    }
}
