//! Per-pass reconciliation reports

use crate::{CpuSpeed, NodeName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stage of node processing that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Probing the node for its CPU model
    Collection,
    /// Writing the label back to the inventory
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collection => "collection",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one node during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Label already matched, no write issued
    Unchanged { label: CpuSpeed },

    /// Label written; `previous` is the raw prior value, if any
    Updated {
        previous: Option<String>,
        current: CpuSpeed,
    },

    /// Node could not be reconciled in this pass
    Failed { stage: Stage, message: String },
}

impl NodeOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, NodeOutcome::Failed { .. })
    }
}

/// Outcome of one node in a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: NodeName,
    #[serde(flatten)]
    pub outcome: NodeOutcome,
}

/// Summary of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Unique identifier of the pass, used in logs
    pub pass_id: Uuid,

    /// When the pass started
    pub started_at: DateTime<Utc>,

    /// When the pass finished, if it did
    pub finished_at: Option<DateTime<Utc>>,

    /// Nodes in the order they were processed
    pub outcomes: Vec<NodeReport>,
}

impl ReconcileReport {
    /// Start a new report
    pub fn new() -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    /// Record the outcome for a node
    pub fn record(&mut self, node: impl Into<NodeName>, outcome: NodeOutcome) {
        self.outcomes.push(NodeReport {
            node: node.into(),
            outcome,
        });
    }

    /// Mark the pass as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of label writes issued
    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, NodeOutcome::Updated { .. }))
            .count()
    }

    /// Number of nodes whose label already matched
    pub fn unchanged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, NodeOutcome::Unchanged { .. }))
            .count()
    }

    /// Number of nodes that failed
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// Whether every processed node succeeded
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Look up the outcome recorded for a node
    pub fn outcome_for(&self, node: &str) -> Option<&NodeOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.node.as_str() == node)
            .map(|r| &r.outcome)
    }

    /// Wall-clock duration of the pass, if finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

impl Default for ReconcileReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counters() {
        let mut report = ReconcileReport::new();
        report.record("a", NodeOutcome::Unchanged { label: CpuSpeed::Fast });
        report.record(
            "b",
            NodeOutcome::Updated {
                previous: None,
                current: CpuSpeed::Medium,
            },
        );
        report.record(
            "c",
            NodeOutcome::Failed {
                stage: Stage::Write,
                message: "conflict".to_string(),
            },
        );
        report.finish();

        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert!(report.duration().is_some());
        assert!(matches!(
            report.outcome_for("b"),
            Some(NodeOutcome::Updated { current: CpuSpeed::Medium, .. })
        ));
        assert!(report.outcome_for("d").is_none());
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = ReconcileReport::new();
        report.record(
            "node1",
            NodeOutcome::Updated {
                previous: Some("fast".to_string()),
                current: CpuSpeed::Medium,
            },
        );

        let value = serde_json::to_value(&report).unwrap();
        let entry = &value["outcomes"][0];
        assert_eq!(entry["node"], "node1");
        assert_eq!(entry["outcome"], "updated");
        assert_eq!(entry["previous"], "fast");
        assert_eq!(entry["current"], "medium");
    }
}
