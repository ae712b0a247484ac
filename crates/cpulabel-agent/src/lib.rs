//! # cpulabel-agent
//!
//! Reconciler and controller daemon (cpulabeld) for cpulabel.
//!
//! This crate wires the node inventory and the CPU signal source into a
//! reconciler, drives it from a controller loop (periodic resync, manual
//! triggers, requeue after failure), and exposes Prometheus metrics.

pub mod agent;
pub mod config;
pub mod context;
pub mod controller;
pub mod metrics;
pub mod reconciler;

// Re-export commonly used types
pub use agent::{Agent, AgentBuilder};
pub use config::AgentConfig;
pub use context::{CancelHandle, ReconcileContext};
pub use controller::{Controller, ControllerHandle, PassStatus};
pub use metrics::{MetricsServer, ReconcileMetrics};
pub use reconciler::{ReconcilePolicy, Reconciler};

// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] cpulabel_core::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Initialize logging and tracing
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(logging_config: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging_config.show_target)
        .with_thread_ids(logging_config.show_thread_ids)
        .with_line_number(logging_config.show_line_numbers);

    let result = match logging_config.format.as_str() {
        "json" => subscriber.json().try_init(),
        _ => subscriber.try_init(),
    };

    result.map_err(|e| AgentError::Config(format!("Failed to initialize logging: {}", e)))
}
