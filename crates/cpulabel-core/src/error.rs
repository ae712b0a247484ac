//! Error handling for cpulabel
//!
//! Provides a unified error type and result type for use across all cpulabel components.

use crate::{CpuSpeed, NodeName, ReconcileReport, Stage};

/// Result type alias for cpulabel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for cpulabel
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node inventory snapshot could not be obtained
    #[error("Inventory fetch error: {0}")]
    InventoryFetch(String),

    /// Remote signal collection failed for a node
    #[error("Probe error on node {node}: {message}")]
    Probe { node: NodeName, message: String },

    /// Probe output did not contain the expected marker
    #[error("Parse error on node {node}: {message}")]
    Parse { node: NodeName, message: String },

    /// Writing the computed label back to the inventory failed
    #[error("Update error on node {node} (cpu-speed={label}): {message}")]
    Update {
        node: NodeName,
        label: CpuSpeed,
        message: String,
    },

    /// The surrounding invocation was cancelled
    #[error("Reconciliation cancelled: {0}")]
    Cancelled(String),

    /// A best-effort pass finished with at least one failed node
    #[error(
        "Reconciliation incomplete: {} of {} nodes failed",
        .0.failed(),
        .0.outcomes.len()
    )]
    Incomplete(Box<ReconcileReport>),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource temporarily unavailable
    #[error("Resource unavailable: {0}")]
    Unavailable(String),

    /// Optimistic concurrency check failed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an inventory fetch error
    pub fn inventory_fetch(msg: impl Into<String>) -> Self {
        Self::InventoryFetch(msg.into())
    }

    /// Create a probe error for a node
    pub fn probe(node: impl Into<NodeName>, msg: impl Into<String>) -> Self {
        Self::Probe {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error for a node
    pub fn parse(node: impl Into<NodeName>, msg: impl Into<String>) -> Self {
        Self::Parse {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create an update error for a node and the label it was given
    pub fn update(node: impl Into<NodeName>, label: CpuSpeed, msg: impl Into<String>) -> Self {
        Self::Update {
            node: node.into(),
            label,
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// The node this error is attributed to, if any
    pub fn node(&self) -> Option<&NodeName> {
        match self {
            Error::Probe { node, .. } | Error::Parse { node, .. } | Error::Update { node, .. } => {
                Some(node)
            }
            _ => None,
        }
    }

    /// The pass stage that produced this error, if it is a per-node failure
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Probe { .. } | Error::Parse { .. } => Some(Stage::Collection),
            Error::Update { .. } => Some(Stage::Write),
            _ => None,
        }
    }

    /// Check if a later pass may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::InventoryFetch(_)
                | Error::Probe { .. }
                | Error::Update { .. }
                | Error::Unavailable(_)
                | Error::Conflict(_)
                | Error::Incomplete(_)
                | Error::Io(_)
        )
    }

    /// Get the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InventoryFetch(_) => "inventory_fetch",
            Error::Probe { .. } => "probe",
            Error::Parse { .. } => "parse",
            Error::Update { .. } => "update",
            Error::Cancelled(_) => "cancelled",
            Error::Incomplete(_) => "incomplete",
            Error::InvalidConfiguration(_) => "configuration",
            Error::NotFound(_) => "not_found",
            Error::Unavailable(_) => "unavailable",
            Error::Conflict(_) => "conflict",
            Error::Io(_) => "io",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeOutcome;

    #[test]
    fn test_error_display() {
        let err = Error::probe("node-b", "connection refused");
        assert_eq!(err.to_string(), "Probe error on node node-b: connection refused");

        let err = Error::update("node-a", CpuSpeed::Fast, "stale resource version");
        assert_eq!(
            err.to_string(),
            "Update error on node node-a (cpu-speed=fast): stale resource version"
        );
    }

    #[test]
    fn test_error_stage_and_node() {
        let err = Error::probe("node-b", "timeout");
        assert_eq!(err.stage(), Some(Stage::Collection));
        assert_eq!(err.node().map(|n| n.as_str()), Some("node-b"));

        let err = Error::update("node-c", CpuSpeed::Slow, "rejected");
        assert_eq!(err.stage(), Some(Stage::Write));

        let err = Error::inventory_fetch("api down");
        assert_eq!(err.stage(), None);
        assert!(err.node().is_none());
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::probe("n", "unreachable").is_retryable());
        assert!(Error::conflict("stale").is_retryable());
        assert!(!Error::cancelled("shutdown").is_retryable());
        assert!(!Error::config("bad").is_retryable());

        assert_eq!(Error::parse("n", "no marker").category(), "parse");
        assert_eq!(Error::cancelled("x").category(), "cancelled");
    }

    #[test]
    fn test_incomplete_display() {
        let mut report = ReconcileReport::new();
        report.record("a", NodeOutcome::Unchanged { label: CpuSpeed::Fast });
        report.record(
            "b",
            NodeOutcome::Failed {
                stage: Stage::Collection,
                message: "timeout".to_string(),
            },
        );

        let err = Error::Incomplete(Box::new(report));
        assert_eq!(err.to_string(), "Reconciliation incomplete: 1 of 2 nodes failed");
    }
}
