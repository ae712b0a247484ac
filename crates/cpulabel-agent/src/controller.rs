//! Controller loop driving reconciliation passes
//!
//! A pass runs at startup, then again after `retry_interval` when it failed
//! with a retryable error or after `resync_interval` otherwise. A manual trigger runs a
//! pass right away; triggers arriving while a pass is in flight collapse into
//! one follow-up pass. Shutdown cancels the in-flight pass.

use crate::config::ReconcileConfig;
use crate::context::{CancelHandle, ReconcileContext};
use crate::reconciler::Reconciler;
use crate::{AgentError, Result};
use cpulabel_core::{Error, ReconcileReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome history of the controller's passes
#[derive(Debug, Clone, Default)]
pub struct PassStatus {
    /// Passes that reconciled every node
    pub succeeded: u64,

    /// Passes that returned an error
    pub failed: u64,

    /// Error of the most recent pass, cleared by a successful pass
    pub last_error: Option<String>,

    /// Report of the most recent pass that produced one
    pub last_report: Option<ReconcileReport>,
}

impl PassStatus {
    /// Total passes run
    pub fn passes(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Schedules reconciliation passes
pub struct Controller {
    reconciler: Arc<Reconciler>,
    resync_interval: Duration,
    retry_interval: Duration,
    pass_timeout: Duration,
}

impl Controller {
    pub fn new(reconciler: Arc<Reconciler>, config: &ReconcileConfig) -> Self {
        Self {
            reconciler,
            resync_interval: config.resync_interval(),
            retry_interval: config.retry_interval(),
            pass_timeout: config.pass_timeout(),
        }
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Start the loop on the current runtime
    pub fn spawn(self) -> ControllerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(PassStatus::default());
        let (root, cancel) = ReconcileContext::new();

        let task = tokio::spawn(self.run(root, trigger_rx, status_tx));

        ControllerHandle {
            trigger_tx,
            cancel,
            status: status_rx,
            task,
        }
    }

    async fn run(
        self,
        root: ReconcileContext,
        mut triggers: mpsc::Receiver<()>,
        status: watch::Sender<PassStatus>,
    ) {
        info!(
            "Controller started (resync every {:?}, retry after {:?})",
            self.resync_interval, self.retry_interval
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = root.cancelled() => break,
                trigger = triggers.recv() => match trigger {
                    Some(()) => debug!("Reconciliation triggered manually"),
                    None => break,
                },
                _ = tokio::time::sleep(delay) => {}
            }

            let ctx = root.clone().with_timeout(self.pass_timeout);
            let result = self.reconciler.reconcile(&ctx).await;
            let cancelled = matches!(result, Err(Error::Cancelled(_)));

            delay = match &result {
                Err(e) if e.is_retryable() => self.retry_interval,
                _ => self.resync_interval,
            };
            match &result {
                Err(e) if cancelled => debug!("Pass cancelled: {}", e),
                Err(e) if e.is_retryable() => {
                    warn!("Reconciliation failed, requeueing in {:?}: {}", delay, e)
                }
                Err(e) => warn!(
                    "Reconciliation failed with a non-retryable {} error, next pass in {:?}: {}",
                    e.category(),
                    delay,
                    e
                ),
                Ok(_) => {}
            }

            status.send_modify(|status| record(status, result));

            if cancelled {
                break;
            }
        }

        info!("Controller stopped");
    }
}

fn record(status: &mut PassStatus, result: cpulabel_core::Result<ReconcileReport>) {
    match result {
        Ok(report) => {
            status.succeeded += 1;
            status.last_error = None;
            status.last_report = Some(report);
        }
        Err(e) => {
            status.failed += 1;
            status.last_error = Some(e.to_string());
            if let Error::Incomplete(report) = e {
                status.last_report = Some(*report);
            }
        }
    }
}

/// Handle to a running controller
///
/// Dropping the handle stops the loop once the current pass finishes.
pub struct ControllerHandle {
    trigger_tx: mpsc::Sender<()>,
    cancel: CancelHandle,
    status: watch::Receiver<PassStatus>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Request a pass now. Returns false when one is already queued or the
    /// controller has stopped.
    pub fn trigger(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Current pass status
    pub fn status(&self) -> PassStatus {
        self.status.borrow().clone()
    }

    /// Wait until at least `passes` passes have finished
    pub async fn wait_for_passes(&self, passes: u64) -> Result<PassStatus> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| s.passes() >= passes)
            .await
            .map_err(|_| AgentError::Service("Controller stopped".to_string()))?;
        Ok(reached.clone())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the in-flight pass and stop the loop
    pub async fn shutdown(self) -> Result<PassStatus> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| AgentError::Service(format!("Controller task failed: {}", e)))?;
        let status = self.status.borrow().clone();
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpulabel_core::{CpuSpeed, MockSignalSource, Node, NodeName, RawSignal, SignalSource};
    use cpulabel_inventory::MemoryInventory;

    fn controller(inventory: &MemoryInventory, signals: &MockSignalSource) -> Controller {
        let reconciler = Reconciler::new(Arc::new(inventory.clone()), Arc::new(signals.clone()));
        Controller::new(Arc::new(reconciler), &ReconcileConfig::default())
    }

    async fn within<T>(future: impl std::future::Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), future)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_pass_runs_immediately() {
        let inventory = MemoryInventory::with_nodes(vec![Node::new("node1")]);
        let signals = MockSignalSource::new().with_signal("node1", "Intel Xeon");

        let handle = controller(&inventory, &signals).spawn();
        let status = within(handle.wait_for_passes(1)).await.unwrap();

        assert_eq!(status.succeeded, 1);
        assert!(status.last_error.is_none());
        assert_eq!(status.last_report.unwrap().updated(), 1);
        assert!(inventory.get("node1").await.unwrap().has_cpu_speed(CpuSpeed::Fast));

        within(handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_trigger_runs_another_pass() {
        let inventory = MemoryInventory::with_nodes(vec![Node::new("node1")]);
        let signals = MockSignalSource::new().with_signal("node1", "Intel Xeon");

        let handle = controller(&inventory, &signals).spawn();
        within(handle.wait_for_passes(1)).await.unwrap();

        // The CPU was swapped between passes
        signals.set_signal("node1", "Intel Core i7").await;
        assert!(handle.trigger());
        let status = within(handle.wait_for_passes(2)).await.unwrap();

        assert_eq!(status.succeeded, 2);
        assert!(inventory.get("node1").await.unwrap().has_cpu_speed(CpuSpeed::Medium));
        within(handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_pass_is_requeued() {
        let inventory = MemoryInventory::with_nodes(vec![Node::new("node1")]);
        inventory.fail_list("apiserver unavailable").await;
        let signals = MockSignalSource::new().with_signal("node1", "Intel Pentium");

        let handle = controller(&inventory, &signals)
            .with_retry_interval(Duration::from_millis(50))
            .spawn();

        let status = within(handle.wait_for_passes(1)).await.unwrap();
        assert_eq!(status.failed, 1);
        assert!(status.last_error.unwrap().contains("apiserver unavailable"));

        inventory.clear_faults().await;
        let status = within(handle.wait_for_passes(2)).await.unwrap();
        assert_eq!(status.succeeded, 1);
        assert!(status.last_error.is_none());
        assert!(inventory.get("node1").await.unwrap().has_cpu_speed(CpuSpeed::Slow));

        within(handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_successful_pass_waits_for_resync() {
        let inventory = MemoryInventory::with_nodes(vec![Node::new("node1")]);
        let signals = MockSignalSource::new().with_signal("node1", "Intel Xeon");

        let handle = controller(&inventory, &signals)
            .with_resync_interval(Duration::from_millis(30))
            .spawn();

        let status = within(handle.wait_for_passes(3)).await.unwrap();
        assert!(status.succeeded >= 3);
        // Only the first pass had anything to write
        assert_eq!(inventory.stats().updates(), 1);

        within(handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_pass() {
        let inventory = MemoryInventory::with_nodes(vec![Node::new("a"), Node::new("b")]);
        let signals = MockSignalSource::new()
            .with_signal("a", "Intel Xeon")
            .with_hang("b");

        let handle = controller(&inventory, &signals).spawn();
        within(async {
            while signals.calls().await.len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(handle.is_running());

        let status = within(handle.shutdown()).await.unwrap();
        assert_eq!(status.failed, 1);
        assert!(status.last_error.unwrap().contains("cancelled"));
        assert!(inventory.get("a").await.unwrap().has_cpu_speed(CpuSpeed::Fast));
    }

    /// Signal source whose CPU model text is never usable
    struct GarbledSignals;

    #[async_trait::async_trait]
    impl SignalSource for GarbledSignals {
        async fn collect(&self, node: &NodeName) -> cpulabel_core::Result<RawSignal> {
            Err(Error::parse(node, "unreadable model name"))
        }
    }

    #[tokio::test]
    async fn test_non_retryable_failure_waits_for_resync() {
        let inventory = MemoryInventory::with_nodes(vec![Node::new("node1")]);
        let reconciler = Reconciler::new(Arc::new(inventory.clone()), Arc::new(GarbledSignals));

        let handle = Controller::new(Arc::new(reconciler), &ReconcileConfig::default())
            .with_resync_interval(Duration::from_secs(60))
            .with_retry_interval(Duration::from_millis(20))
            .spawn();

        let status = within(handle.wait_for_passes(1)).await.unwrap();
        assert_eq!(status.failed, 1);
        assert!(status.last_error.unwrap().contains("unreadable model name"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(handle.status().passes(), 1);

        // A trigger still runs a pass right away
        assert!(handle.trigger());
        let status = within(handle.wait_for_passes(2)).await.unwrap();
        assert_eq!(status.failed, 2);

        within(handle.shutdown()).await.unwrap();
    }
}
