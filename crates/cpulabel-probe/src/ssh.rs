//! SSH probe transport

use crate::config::{ProbeConfig, SshConfig};
use crate::transport::ProbeTransport;
use crate::{ProbeError, Result};
use async_trait::async_trait;
use cpulabel_core::NodeName;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs the probe command on the node through the system ssh client
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: SshConfig,
    timeout: Duration,
}

impl SshTransport {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            config: config.ssh.clone(),
            timeout: config.timeout(),
        }
    }

    /// Destination argument, `user@node` or just `node`
    fn destination(&self, node: &NodeName) -> String {
        match &self.config.user {
            Some(user) => format!("{}@{}", user, node),
            None => node.to_string(),
        }
    }

    /// Argument vector passed to the ssh program
    pub fn build_args(&self, node: &NodeName, command: &str) -> Vec<String> {
        let mut args = self.config.options.clone();

        if let Some(port) = self.config.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        args.push(self.destination(node));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl ProbeTransport for SshTransport {
    async fn run(&self, node: &NodeName, command: &str) -> Result<String> {
        let args = self.build_args(node, command);
        debug!("Running {} {:?}", self.config.program, args);

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Spawn(format!("{}: {}", self.config.program, e)))?;

        // Dropping the pending future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ProbeError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}
