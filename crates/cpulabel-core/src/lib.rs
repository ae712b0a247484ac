//! # cpulabel-core
//!
//! Core types, traits, and utilities for cpulabel - a controller that keeps a
//! `cpu-speed` label on every cluster node in sync with the CPU model reported
//! by the node itself.
//!
//! This crate provides the foundational pieces shared by the other crates:
//!
//! - Node, label and signal types
//! - The CPU classifier
//! - Interfaces for the node inventory and the signal source
//! - Per-pass reconciliation reports
//! - Error handling types and utilities

pub mod classify;
pub mod error;
pub mod labels;
pub mod report;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use classify::classify;
pub use error::{Error, Result};
pub use labels::{CpuSpeed, CPU_SPEED_LABEL};
pub use report::{NodeOutcome, ReconcileReport, Stage};
pub use traits::{MockSignalSource, NodeInventory, SignalSource};
pub use types::{Node, NodeName, RawSignal};
