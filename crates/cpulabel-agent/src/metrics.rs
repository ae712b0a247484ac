//! Prometheus metrics for reconciliation passes and the HTTP endpoint serving them

use crate::{AgentError, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use cpulabel_core::{CpuSpeed, Error, ReconcileReport};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Reconciliation metrics
#[derive(Debug, Clone)]
pub struct ReconcileMetrics {
    registry: Arc<Registry>,
    passes: IntCounterVec,
    errors: IntCounterVec,
    label_updates: IntCounterVec,
    nodes_observed: IntGauge,
    duration: Histogram,
}

impl ReconcileMetrics {
    /// Create the metrics and register them in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let passes = IntCounterVec::new(
            Opts::new("cpulabel_reconcile_passes_total", "Reconciliation passes by result"),
            &["result"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "cpulabel_reconcile_errors_total",
                "Reconciliation errors by error category",
            ),
            &["category"],
        )?;
        let label_updates = IntCounterVec::new(
            Opts::new(
                "cpulabel_label_updates_total",
                "cpu-speed label writes by written value",
            ),
            &["label"],
        )?;
        let nodes_observed = IntGauge::new(
            "cpulabel_nodes_observed",
            "Nodes in the inventory snapshot of the last pass",
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "cpulabel_reconcile_duration_seconds",
            "Wall-clock duration of reconciliation passes",
        ))?;

        registry.register(Box::new(passes.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(label_updates.clone()))?;
        registry.register(Box::new(nodes_observed.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            passes,
            errors,
            label_updates,
            nodes_observed,
            duration,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn observe_nodes(&self, count: usize) {
        self.nodes_observed.set(count as i64);
    }

    pub fn observe_label_update(&self, label: CpuSpeed) {
        self.label_updates.with_label_values(&[label.as_str()]).inc();
    }

    /// Count an error under its category
    pub fn observe_error(&self, error: &Error) {
        self.errors.with_label_values(&[error.category()]).inc();
    }

    /// Record a finished pass
    pub fn observe_pass(&self, report: &ReconcileReport, result: &str) {
        self.passes.with_label_values(&[result]).inc();
        if let Some(duration) = report.duration().and_then(|d| d.to_std().ok()) {
            self.duration.observe(duration.as_secs_f64());
        }
    }

    /// Export metrics as Prometheus text format
    pub fn render(&self) -> Result<String> {
        encode(&self.registry)
    }
}

fn encode(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| AgentError::Service(format!("Metrics are not valid UTF-8: {}", e)))
}

/// HTTP endpoint serving `/metrics` and `/health`
#[derive(Debug)]
pub struct MetricsServer {
    bind_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MetricsServer {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            local_addr: None,
            server_handle: None,
        }
    }

    /// Start the HTTP server
    pub async fn start(&mut self, metrics: &ReconcileMetrics) -> Result<()> {
        if self.server_handle.is_some() {
            return Err(AgentError::Service("Metrics server already started".to_string()));
        }

        let app = create_metrics_app(metrics.registry.clone());
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        info!("Starting metrics server on {}", local_addr);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("Metrics server error: {}", e);
            }
        });

        self.local_addr = Some(local_addr);
        self.server_handle = Some(handle);
        Ok(())
    }

    /// Stop the HTTP server
    pub async fn stop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.server_handle.is_some()
    }
}

impl Drop for MetricsServer {
    fn drop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

fn create_metrics_app(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    match encode(&registry) {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", TextEncoder::new().format_type().to_string())],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
