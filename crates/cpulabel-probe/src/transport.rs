//! Probe transport interface

use crate::Result;
use async_trait::async_trait;
use cpulabel_core::NodeName;

/// Runs a single command on a named node and returns its standard output.
///
/// Mapping the node name to a reachable endpoint is the transport's job.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn run(&self, node: &NodeName, command: &str) -> Result<String>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
