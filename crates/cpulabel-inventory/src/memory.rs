//! In-memory node inventory

use async_trait::async_trait;
use cpulabel_core::{Error, Node, NodeInventory, NodeName, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory node inventory with optimistic concurrency
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    /// Nodes indexed by name; iteration is sorted by name
    nodes: Arc<RwLock<BTreeMap<NodeName, Node>>>,

    /// Injected failures
    faults: Arc<RwLock<Faults>>,

    /// Statistics
    stats: Arc<InventoryStats>,
}

#[derive(Debug, Default)]
struct Faults {
    list: Option<String>,
    updates: HashMap<NodeName, String>,
}

/// Inventory statistics
#[derive(Debug, Default)]
pub struct InventoryStats {
    pub lists: AtomicU64,
    pub updates: AtomicU64,
    pub conflicts: AtomicU64,
    pub rejected: AtomicU64,
}

impl InventoryStats {
    /// Accepted writes so far
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Writes rejected for a stale resource version
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Writes refused by an injected fault
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl MemoryInventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inventory holding `nodes`
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|mut node| {
                node.resource_version = node.resource_version.max(1);
                (node.name.clone(), node)
            })
            .collect();

        Self {
            nodes: Arc::new(RwLock::new(nodes)),
            ..Self::default()
        }
    }

    /// Insert or replace a node, bypassing the version check
    pub async fn insert(&self, mut node: Node) {
        let mut nodes = self.nodes.write().await;
        let current = nodes.get(&node.name).map(|n| n.resource_version).unwrap_or(0);
        node.resource_version = node.resource_version.max(current + 1);
        nodes.insert(node.name.clone(), node);
    }

    /// Current stored copy of a node
    pub async fn get(&self, name: &str) -> Option<Node> {
        self.nodes.read().await.get(&NodeName::from(name)).cloned()
    }

    /// Make every `list` call fail until cleared
    pub async fn fail_list(&self, message: impl Into<String>) {
        self.faults.write().await.list = Some(message.into());
    }

    /// Make every `update` of `node` fail until cleared
    pub async fn fail_updates_for(&self, node: impl Into<NodeName>, message: impl Into<String>) {
        self.faults
            .write()
            .await
            .updates
            .insert(node.into(), message.into());
    }

    /// Remove all injected failures
    pub async fn clear_faults(&self) {
        let mut faults = self.faults.write().await;
        faults.list = None;
        faults.updates.clear();
    }

    /// Get the inventory statistics
    pub fn stats(&self) -> &InventoryStats {
        &self.stats
    }
}

#[async_trait]
impl NodeInventory for MemoryInventory {
    async fn list(&self) -> Result<Vec<Node>> {
        self.stats.lists.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = &self.faults.read().await.list {
            return Err(Error::unavailable(message.clone()));
        }

        Ok(self.nodes.read().await.values().cloned().collect())
    }

    async fn update(&self, node: &Node) -> Result<Node> {
        if let Some(message) = self.faults.read().await.updates.get(&node.name) {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Error::unavailable(message.clone()));
        }

        let mut nodes = self.nodes.write().await;
        let stored = nodes
            .get(&node.name)
            .ok_or_else(|| Error::not_found(format!("node {}", node.name)))?;

        if stored.resource_version != node.resource_version {
            self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(Error::conflict(format!(
                "node {} is at resource version {}, update was based on {}",
                node.name, stored.resource_version, node.resource_version
            )));
        }

        let mut updated = node.clone();
        updated.resource_version = stored.resource_version + 1;
        nodes.insert(updated.name.clone(), updated.clone());
        self.stats.updates.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Updated node {} to resource version {}",
            updated.name, updated.resource_version
        );
        Ok(updated)
    }
}
