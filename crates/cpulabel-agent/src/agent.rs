//! Core agent implementation

use crate::config::AgentConfig;
use crate::context::ReconcileContext;
use crate::controller::{Controller, ControllerHandle, PassStatus};
use crate::metrics::{MetricsServer, ReconcileMetrics};
use crate::reconciler::Reconciler;
use crate::{AgentError, Result};
use cpulabel_core::{NodeInventory, NodeName, RawSignal, ReconcileReport, SignalSource};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// The cpulabel agent
pub struct Agent {
    config: AgentConfig,
    reconciler: Arc<Reconciler>,
    signals: Arc<dyn SignalSource>,
    metrics: ReconcileMetrics,
    metrics_server: Option<MetricsServer>,
    controller: Option<ControllerHandle>,
}

impl Agent {
    /// Start the metrics endpoint and the controller loop
    pub async fn start(&mut self) -> Result<()> {
        if self.controller.is_some() {
            return Err(AgentError::Service("Agent already started".to_string()));
        }

        info!("Starting cpulabel agent: {}", self.config.agent.name);

        if self.config.metrics.enabled {
            let mut server = MetricsServer::new(self.config.metrics.bind_addr);
            server.start(&self.metrics).await?;
            self.metrics_server = Some(server);
        }

        let controller = Controller::new(self.reconciler.clone(), &self.config.reconcile);
        self.controller = Some(controller.spawn());

        info!("cpulabel agent started");
        Ok(())
    }

    /// Stop the controller and the metrics endpoint
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping cpulabel agent");

        if let Some(controller) = self.controller.take() {
            let timeout = Duration::from_secs(self.config.agent.shutdown_timeout_seconds);
            match tokio::time::timeout(timeout, controller.shutdown()).await {
                Ok(Ok(status)) => info!(
                    "Controller stopped after {} passes ({} failed)",
                    status.passes(),
                    status.failed
                ),
                Ok(Err(e)) => warn!("Controller did not stop cleanly: {}", e),
                Err(_) => warn!("Controller did not stop within {:?}", timeout),
            }
        }

        if let Some(mut server) = self.metrics_server.take() {
            server.stop().await;
        }

        info!("cpulabel agent stopped");
        Ok(())
    }

    /// Run the agent until Ctrl+C
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }

        self.stop().await
    }

    /// Run a single reconciliation pass. Ctrl+C cancels it.
    pub async fn run_once(&self) -> cpulabel_core::Result<ReconcileReport> {
        let (ctx, cancel) = ReconcileContext::new();
        let ctx = ctx.with_timeout(self.config.reconcile.pass_timeout());

        let pass = self.reconciler.reconcile(&ctx);
        tokio::pin!(pass);

        tokio::select! {
            result = &mut pass => result,
            Ok(()) = signal::ctrl_c() => {
                info!("Received Ctrl+C signal, cancelling pass");
                cancel.cancel();
                pass.await
            }
        }
    }

    /// Probe one node with the configured signal source
    pub async fn probe(&self, node: impl Into<NodeName>) -> cpulabel_core::Result<RawSignal> {
        self.signals.collect(&node.into()).await
    }

    /// Request an immediate pass from the running controller
    pub fn trigger(&self) -> bool {
        self.controller
            .as_ref()
            .map(ControllerHandle::trigger)
            .unwrap_or(false)
    }

    /// Pass status of the running controller
    pub fn controller_status(&self) -> Option<PassStatus> {
        self.controller.as_ref().map(ControllerHandle::status)
    }

    /// Wait until the running controller has finished `passes` passes
    pub async fn wait_for_passes(&self, passes: u64) -> Result<PassStatus> {
        match &self.controller {
            Some(controller) => controller.wait_for_passes(passes).await,
            None => Err(AgentError::Service("Agent is not running".to_string())),
        }
    }

    /// Address of the metrics endpoint, once started
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_server.as_ref().and_then(MetricsServer::local_addr)
    }

    /// Get the agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the reconciliation metrics
    pub fn metrics(&self) -> &ReconcileMetrics {
        &self.metrics
    }
}

/// Builder for creating agents
#[derive(Default)]
pub struct AgentBuilder {
    config: Option<AgentConfig>,
    inventory: Option<Arc<dyn NodeInventory>>,
    signals: Option<Arc<dyn SignalSource>>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the agent configuration
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `inventory` instead of the configured backend
    pub fn with_inventory(mut self, inventory: Arc<dyn NodeInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Use `signals` instead of the configured probe backend
    pub fn with_signal_source(mut self, signals: Arc<dyn SignalSource>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let inventory = match self.inventory {
            Some(inventory) => inventory,
            None => cpulabel_inventory::build_inventory(&config.inventory)?,
        };
        let signals = match self.signals {
            Some(signals) => signals,
            None => cpulabel_probe::build_signal_source(&config.probe)?,
        };

        let metrics = ReconcileMetrics::new()?;
        let reconciler = Reconciler::new(inventory, signals.clone())
            .with_policy(config.reconcile.policy)
            .with_metrics(metrics.clone());

        Ok(Agent {
            config,
            reconciler: Arc::new(reconciler),
            signals,
            metrics,
            metrics_server: None,
            controller: None,
        })
    }
}
