//! Core type definitions for cpulabel

use crate::{CpuSpeed, CPU_SPEED_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identity of a node, used both as inventory key and probe address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    /// Create a new NodeName from a string
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the string representation of the NodeName
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for NodeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<&NodeName> for NodeName {
    fn from(name: &NodeName) -> Self {
        name.clone()
    }
}

/// A node as held by the inventory store.
///
/// The label map belongs to the inventory; cpulabel only touches
/// [`CPU_SPEED_LABEL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identity
    pub name: NodeName,

    /// Labels on the node
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Version of the stored object, bumped by every accepted write
    #[serde(default)]
    pub resource_version: u64,
}

impl Node {
    /// Create a node with no labels
    pub fn new(name: impl Into<NodeName>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            resource_version: 0,
        }
    }

    /// Builder for an arbitrary label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Current raw value of the reserved label
    pub fn cpu_speed_label(&self) -> Option<&str> {
        self.labels.get(CPU_SPEED_LABEL).map(String::as_str)
    }

    /// Set the reserved label, leaving every other key alone
    pub fn set_cpu_speed(&mut self, speed: CpuSpeed) {
        self.labels
            .insert(CPU_SPEED_LABEL.to_string(), speed.as_str().to_string());
    }

    /// Whether the reserved label already holds `speed`
    pub fn has_cpu_speed(&self, speed: CpuSpeed) -> bool {
        self.cpu_speed_label() == Some(speed.as_str())
    }
}

/// CPU model text returned by a probe. Lives for one node in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSignal(String);

impl RawSignal {
    pub fn new(signal: impl Into<String>) -> Self {
        Self(signal.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Classify this signal
    pub fn classify(&self) -> CpuSpeed {
        crate::classify(&self.0)
    }
}

impl fmt::Display for RawSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
