//! Probe configuration

use cpulabel_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Probe backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeBackend {
    /// Remote execution over ssh
    Ssh,
    /// Scripted responses, for development and tests
    Mock,
}

/// What to do when the probe output has no `Model name:` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Treat it as an empty model string, which classifies as `unknown`
    Lenient,
    /// Fail the node with a parse error
    Strict,
}

/// Probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Backend to use
    pub backend: ProbeBackend,

    /// Command executed on the node
    pub command: String,

    /// Handling of output without a model line
    pub parse_mode: ParseMode,

    /// Upper bound for a single probe (seconds)
    pub timeout_seconds: u64,

    /// SSH transport settings
    pub ssh: SshConfig,

    /// Mock backend settings
    pub mock: MockProbeConfig,
}

/// SSH transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// ssh client executable
    pub program: String,

    /// Remote user, defaults to the ssh client's choice
    pub user: Option<String>,

    /// Remote port
    pub port: Option<u16>,

    /// Extra arguments placed before the destination
    pub options: Vec<String>,
}

/// Mock backend configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockProbeConfig {
    /// CPU model reported per node
    pub models: BTreeMap<String, String>,

    /// CPU model for nodes not listed in `models`; unlisted nodes fail otherwise
    pub default_model: Option<String>,
}

impl ProbeConfig {
    /// Probe timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Builder pattern for optional fields
    pub fn with_backend(mut self, backend: ProbeBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(Error::config("Probe command cannot be empty"));
        }

        if self.timeout_seconds == 0 {
            return Err(Error::config("Probe timeout must be greater than 0"));
        }

        if self.backend == ProbeBackend::Ssh && self.ssh.program.trim().is_empty() {
            return Err(Error::config("SSH program cannot be empty"));
        }

        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: ProbeBackend::Ssh,
            // Pin the locale so lscpu prints the English field names
            command: "LC_ALL=C lscpu".to_string(),
            parse_mode: ParseMode::Lenient,
            timeout_seconds: 15,
            ssh: SshConfig::default(),
            mock: MockProbeConfig::default(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: None,
            port: None,
            options: vec![
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                "ConnectTimeout=10".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProbeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.backend, ProbeBackend::Ssh);
        assert_eq!(config.parse_mode, ParseMode::Lenient);
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_config_validation() {
        let mut config = ProbeConfig::default();
        config.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = ProbeConfig::default();
        config.command = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = ProbeConfig::default();
        config.ssh.program = String::new();
        assert!(config.validate().is_err());

        // The ssh program is irrelevant for the mock backend
        config.backend = ProbeBackend::Mock;
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: ProbeConfig =
            serde_yaml::from_str("parse_mode: strict\nssh:\n  user: root\n").unwrap();
        assert_eq!(config.parse_mode, ParseMode::Strict);
        assert_eq!(config.ssh.user.as_deref(), Some("root"));
        assert_eq!(config.ssh.program, "ssh");
        assert_eq!(config.command, "LC_ALL=C lscpu");
    }

    #[test]
    fn test_builder() {
        let config = ProbeConfig::default()
            .with_backend(ProbeBackend::Mock)
            .with_parse_mode(ParseMode::Strict)
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.backend, ProbeBackend::Mock);
        assert_eq!(config.parse_mode, ParseMode::Strict);
        assert_eq!(config.timeout_seconds, 3);
    }
}
