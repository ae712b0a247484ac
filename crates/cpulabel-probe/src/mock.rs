//! Mock probe transport for testing

use crate::config::MockProbeConfig;
use crate::transport::ProbeTransport;
use crate::{ProbeError, Result};
use async_trait::async_trait;
use cpulabel_core::NodeName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
enum ScriptedOutput {
    Output(String),
    ExitStatus(i32, String),
}

/// Mock transport answering from per-node scripts
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    scripts: Arc<RwLock<HashMap<NodeName, ScriptedOutput>>>,
    default_output: Option<String>,
    calls: Arc<RwLock<Vec<(NodeName, String)>>>,
}

/// Render the lscpu output a node with `model` would produce
pub fn lscpu_output(model: &str) -> String {
    format!(
        "Architecture:                       x86_64\nModel name:                         {}\nCPU family:                         6\n",
        model
    )
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the daemon's mock configuration
    pub fn from_config(config: &MockProbeConfig) -> Self {
        let scripts = config
            .models
            .iter()
            .map(|(node, model)| {
                (
                    NodeName::from(node.as_str()),
                    ScriptedOutput::Output(lscpu_output(model)),
                )
            })
            .collect();

        Self {
            scripts: Arc::new(RwLock::new(scripts)),
            default_output: config.default_model.as_deref().map(lscpu_output),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Raw stdout returned for `node`
    pub fn with_output(self, node: impl Into<NodeName>, output: impl Into<String>) -> Self {
        self.script(node.into(), ScriptedOutput::Output(output.into()))
    }

    /// lscpu output reporting `model` for `node`
    pub fn with_model(self, node: impl Into<NodeName>, model: &str) -> Self {
        self.with_output(node, lscpu_output(model))
    }

    /// Non-zero exit with `stderr` for `node`
    pub fn with_exit_status(
        self,
        node: impl Into<NodeName>,
        code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        self.script(node.into(), ScriptedOutput::ExitStatus(code, stderr.into()))
    }

    fn script(self, node: NodeName, output: ScriptedOutput) -> Self {
        if let Ok(mut scripts) = self.scripts.try_write() {
            scripts.insert(node, output);
        }
        self
    }

    /// (node, command) pairs in call order
    pub async fn calls(&self) -> Vec<(NodeName, String)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ProbeTransport for MockTransport {
    async fn run(&self, node: &NodeName, command: &str) -> Result<String> {
        debug!("Mock probe of {} running {:?}", node, command);
        self.calls
            .write()
            .await
            .push((node.clone(), command.to_string()));

        match self.scripts.read().await.get(node).cloned() {
            Some(ScriptedOutput::Output(output)) => Ok(output),
            Some(ScriptedOutput::ExitStatus(code, stderr)) => Err(ProbeError::ExitStatus {
                code: Some(code),
                stderr,
            }),
            None => match &self.default_output {
                Some(output) => Ok(output.clone()),
                None => Err(ProbeError::Unavailable(format!(
                    "no mock output for node {}",
                    node
                ))),
            },
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
