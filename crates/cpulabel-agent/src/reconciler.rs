//! Node label reconciler
//!
//! A pass lists the node inventory, probes every node for its CPU model,
//! classifies it, and writes the `cpu-speed` label where it differs from the
//! stored value. Nodes are processed one at a time in inventory order.
//!
//! The reconciler holds no state between passes and never retries inside a
//! pass. Whoever triggers it decides when to run again.

use crate::context::ReconcileContext;
use crate::metrics::ReconcileMetrics;
use cpulabel_core::{
    CpuSpeed, Error, Node, NodeInventory, NodeName, NodeOutcome, RawSignal, ReconcileReport,
    Result, SignalSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a pass treats a failing node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Abort the pass on the first node that fails to probe or update.
    /// Nodes after it are not touched until the next pass.
    #[default]
    FailFast,

    /// Keep going past failed nodes and report all of them at the end as
    /// [`Error::Incomplete`]. Inventory and cancellation errors still abort.
    BestEffort,
}

/// Keeps the `cpu-speed` label of every node in agreement with its CPU model
pub struct Reconciler {
    inventory: Arc<dyn NodeInventory>,
    signals: Arc<dyn SignalSource>,
    policy: ReconcilePolicy,
    metrics: Option<ReconcileMetrics>,
}

impl Reconciler {
    pub fn new(inventory: Arc<dyn NodeInventory>, signals: Arc<dyn SignalSource>) -> Self {
        Self {
            inventory,
            signals,
            policy: ReconcilePolicy::default(),
            metrics: None,
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: ReconcileMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Run one reconciliation pass.
    ///
    /// Succeeds only when every node in the snapshot was probed and, where
    /// needed, updated. Writes made before a failure are kept.
    pub async fn reconcile(&self, ctx: &ReconcileContext) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        info!("Starting reconciliation pass {}", report.pass_id);

        let result = self.run_pass(ctx, &mut report).await;
        report.finish();

        let result = match result {
            Ok(()) if report.is_success() => Ok(()),
            Ok(()) => Err(Error::Incomplete(Box::new(report.clone()))),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => info!(
                "Reconciliation pass {} complete: {} nodes, {} updated, {} unchanged",
                report.pass_id,
                report.outcomes.len(),
                report.updated(),
                report.unchanged()
            ),
            Err(e) => error!("Reconciliation pass {} failed: {}", report.pass_id, e),
        }

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(()) => "success",
                Err(Error::Cancelled(_)) => "cancelled",
                Err(_) => "failure",
            };
            metrics.observe_pass(&report, outcome);
        }

        result.map(|()| report)
    }

    async fn run_pass(&self, ctx: &ReconcileContext, report: &mut ReconcileReport) -> Result<()> {
        self.ensure_active(ctx, None).map_err(|e| self.observed(e))?;

        let nodes = self.list(ctx).await.map_err(|e| self.observed(e))?;

        debug!("Inventory snapshot has {} nodes", nodes.len());
        if let Some(metrics) = &self.metrics {
            metrics.observe_nodes(nodes.len());
        }

        for node in nodes {
            self.ensure_active(ctx, Some(&node.name))
                .map_err(|e| self.observed(e))?;

            let name = node.name.clone();
            match self.reconcile_node(ctx, node).await {
                Ok(outcome) => report.record(name, outcome),
                Err(e) => {
                    self.observe_error(&e);
                    if matches!(e, Error::Cancelled(_)) {
                        return Err(e);
                    }
                    let stage = e.stage().unwrap_or(cpulabel_core::Stage::Collection);
                    report.record(
                        name.clone(),
                        NodeOutcome::Failed {
                            stage,
                            message: e.to_string(),
                        },
                    );

                    match self.policy {
                        ReconcilePolicy::FailFast => return Err(e),
                        ReconcilePolicy::BestEffort => {
                            warn!("Node {} failed at {} stage, continuing: {}", name, stage, e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Probe, classify, and write one node
    async fn reconcile_node(&self, ctx: &ReconcileContext, mut node: Node) -> Result<NodeOutcome> {
        if ctx.is_expired() {
            return Err(Error::probe(
                &node.name,
                "pass deadline expired before the node was probed",
            ));
        }

        let signal = self.collect(ctx, &node.name).await?;
        let label = signal.classify();

        if node.has_cpu_speed(label) {
            debug!("Node {} already labeled cpu-speed={}", node.name, label);
            return Ok(NodeOutcome::Unchanged { label });
        }

        let previous = node.cpu_speed_label().map(str::to_string);
        node.set_cpu_speed(label);
        self.write(ctx, &node, label).await?;

        info!(
            "Labeled node {} cpu-speed={} (previously {})",
            node.name,
            label,
            previous.as_deref().unwrap_or("unset")
        );
        if let Some(metrics) = &self.metrics {
            metrics.observe_label_update(label);
        }

        Ok(NodeOutcome::Updated {
            previous,
            current: label,
        })
    }

    // The inventory calls and the probe below all race the context. A store
    // update is atomic per node, so abandoning one mid-flight leaves the node
    // either written or untouched.

    async fn list(&self, ctx: &ReconcileContext) -> Result<Vec<Node>> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::cancelled("while listing nodes")),
            _ = ctx.deadline_reached() => Err(Error::inventory_fetch(
                "pass deadline exceeded while listing nodes",
            )),
            result = self.inventory.list() => {
                result.map_err(|e| Error::inventory_fetch(e.to_string()))
            }
        }
    }

    async fn collect(&self, ctx: &ReconcileContext, node: &NodeName) -> Result<RawSignal> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::cancelled(format!("while probing node {}", node))),
            _ = ctx.deadline_reached() => Err(Error::probe(node, "deadline exceeded")),
            result = self.signals.collect(node) => result,
        }
    }

    async fn write(&self, ctx: &ReconcileContext, node: &Node, label: CpuSpeed) -> Result<Node> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                Err(Error::cancelled(format!("while updating node {}", node.name)))
            }
            _ = ctx.deadline_reached() => {
                Err(Error::update(&node.name, label, "deadline exceeded"))
            }
            result = self.inventory.update(node) => {
                result.map_err(|e| Error::update(&node.name, label, e.to_string()))
            }
        }
    }

    /// Fail once cancellation is signalled; `node` is the next node due
    fn ensure_active(&self, ctx: &ReconcileContext, node: Option<&NodeName>) -> Result<()> {
        if !ctx.is_cancelled() {
            return Ok(());
        }
        Err(match node {
            Some(node) => Error::cancelled(format!("before node {}", node)),
            None => Error::cancelled("before listing nodes"),
        })
    }

    fn observed(&self, e: Error) -> Error {
        self.observe_error(&e);
        e
    }

    fn observe_error(&self, e: &Error) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_error(e);
        }
    }
}
