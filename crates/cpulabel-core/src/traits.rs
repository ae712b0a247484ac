//! Core traits for cpulabel components
//!
//! These traits define the two collaborators the reconciler is built on: the
//! cluster's node inventory and the per-node signal source. Implementations
//! live in `cpulabel-inventory` and `cpulabel-probe`.

use crate::{Error, Node, NodeName, RawSignal, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Trait for the store that owns node objects
#[async_trait]
pub trait NodeInventory: Send + Sync {
    /// Snapshot of every node currently in the inventory
    async fn list(&self) -> Result<Vec<Node>>;

    /// Write a node back, returning the stored object.
    ///
    /// The write is conditional on `node.resource_version` matching the
    /// stored version; a stale version fails with [`Error::Conflict`].
    async fn update(&self, node: &Node) -> Result<Node>;
}

/// Trait for collecting the CPU model string of a node
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Probe the node and return its CPU model text
    async fn collect(&self, node: &NodeName) -> Result<RawSignal>;
}

/// Mock implementations for testing and development

#[derive(Debug, Clone)]
enum MockResponse {
    Signal(String),
    Failure(String),
    Hang,
}

/// Mock signal source with scripted per-node responses
#[derive(Debug, Clone, Default)]
pub struct MockSignalSource {
    responses: Arc<RwLock<HashMap<NodeName, MockResponse>>>,
    calls: Arc<RwLock<Vec<NodeName>>>,
    delay: Option<Duration>,
}

impl MockSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `signal` when `node` is probed
    pub fn with_signal(self, node: impl Into<NodeName>, signal: impl Into<String>) -> Self {
        self.script(node.into(), MockResponse::Signal(signal.into()))
    }

    /// Fail with a probe error when `node` is probed
    pub fn with_failure(self, node: impl Into<NodeName>, message: impl Into<String>) -> Self {
        self.script(node.into(), MockResponse::Failure(message.into()))
    }

    /// Never answer when `node` is probed
    pub fn with_hang(self, node: impl Into<NodeName>) -> Self {
        self.script(node.into(), MockResponse::Hang)
    }

    /// Delay every answer by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn script(self, node: NodeName, response: MockResponse) -> Self {
        // Builder runs before the source is shared
        if let Ok(mut responses) = self.responses.try_write() {
            responses.insert(node, response);
        }
        self
    }

    /// Replace the scripted signal for a node at runtime
    pub async fn set_signal(&self, node: impl Into<NodeName>, signal: impl Into<String>) {
        self.responses
            .write()
            .await
            .insert(node.into(), MockResponse::Signal(signal.into()));
    }

    /// Nodes probed so far, in call order
    pub async fn calls(&self) -> Vec<NodeName> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl SignalSource for MockSignalSource {
    async fn collect(&self, node: &NodeName) -> Result<RawSignal> {
        self.calls.write().await.push(node.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.read().await.get(node).cloned();
        match response {
            Some(MockResponse::Signal(signal)) => Ok(RawSignal::new(signal)),
            Some(MockResponse::Failure(message)) => Err(Error::probe(node, message)),
            Some(MockResponse::Hang) => std::future::pending().await,
            None => Err(Error::probe(node, "no scripted response")),
        }
    }
}
