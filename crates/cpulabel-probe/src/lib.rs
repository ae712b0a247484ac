//! # cpulabel-probe
//!
//! Remote CPU model probing for cpulabel.
//!
//! This crate provides:
//! - A transport abstraction for running one command on a named node
//! - An SSH transport built on `tokio::process`
//! - Parsing of `lscpu` output into a CPU model string
//! - [`CpuSignalCollector`], the [`cpulabel_core::SignalSource`] used by the reconciler
//!
//! ## Example
//!
//! ```rust,no_run
//! use cpulabel_core::{NodeName, SignalSource};
//! use cpulabel_probe::{CpuSignalCollector, ProbeConfig, SshTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProbeConfig::default();
//!     let collector = CpuSignalCollector::new(SshTransport::new(&config), &config);
//!
//!     let signal = collector.collect(&NodeName::from("worker-1")).await?;
//!     println!("worker-1: {} ({})", signal, signal.classify());
//!     Ok(())
//! }
//! ```

use cpulabel_core::{Error, NodeName, SignalSource};
use std::sync::Arc;
use thiserror::Error;

pub mod collector;
pub mod config;
pub mod lscpu;
pub mod ssh;
pub mod transport;

// Mock implementation for testing
#[cfg(any(feature = "mock", test))]
pub mod mock;

// Re-export main types
pub use collector::CpuSignalCollector;
pub use config::{MockProbeConfig, ParseMode, ProbeBackend, ProbeConfig, SshConfig};
pub use lscpu::{extract_model_name, MODEL_NAME_MARKER};
pub use ssh::SshTransport;
pub use transport::ProbeTransport;

#[cfg(any(feature = "mock", test))]
pub use mock::MockTransport;

/// Result type for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that can occur while probing a node
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to start probe: {0}")]
    Spawn(String),

    #[error("probe exited with {}: {stderr}", exit_code_display(.code))]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("probe timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("probe output has no '{}' line", MODEL_NAME_MARKER)]
    MarkerMissing,

    #[error("probe transport unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl ProbeError {
    /// Attach the node identity and convert into the shared error type
    pub fn into_core(self, node: &NodeName) -> Error {
        match self {
            ProbeError::MarkerMissing => Error::parse(node, self.to_string()),
            other => Error::probe(node, other.to_string()),
        }
    }
}

/// Build the signal source selected by `config.backend`
pub fn build_signal_source(config: &ProbeConfig) -> cpulabel_core::Result<Arc<dyn SignalSource>> {
    config.validate()?;

    match config.backend {
        ProbeBackend::Ssh => Ok(Arc::new(CpuSignalCollector::new(
            SshTransport::new(config),
            config,
        ))),
        #[cfg(any(feature = "mock", test))]
        ProbeBackend::Mock => Ok(Arc::new(CpuSignalCollector::new(
            MockTransport::from_config(&config.mock),
            config,
        ))),
        #[cfg(not(any(feature = "mock", test)))]
        ProbeBackend::Mock => Err(Error::config(
            "mock probe backend requires the 'mock' feature",
        )),
    }
}
