//! Configuration management for the cpulabel agent

use crate::reconciler::ReconcilePolicy;
use crate::{AgentError, Result};
use cpulabel_inventory::InventoryConfig;
use cpulabel_probe::ProbeConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "CPULABEL_CONFIG";

/// Prefix of environment overrides, e.g. `CPULABEL_RECONCILE__POLICY`
pub const ENV_PREFIX: &str = "CPULABEL";

const DEFAULT_CONFIG_PATHS: &[&str] = &["./cpulabel.yaml", "/etc/cpulabel/config.yaml"];

/// Complete configuration for the cpulabel agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent-specific configuration
    pub agent: AgentSpecificConfig,

    /// Reconciliation scheduling and policy
    pub reconcile: ReconcileConfig,

    /// Signal collection
    pub probe: ProbeConfig,

    /// Node inventory backend
    pub inventory: InventoryConfig,

    /// Metrics endpoint
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Agent-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSpecificConfig {
    /// Agent name/identifier
    pub name: String,

    /// Graceful shutdown timeout (seconds)
    pub shutdown_timeout_seconds: u64,
}

/// Reconciliation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Failure handling within a pass
    pub policy: ReconcilePolicy,

    /// Interval between passes after a successful pass (seconds)
    pub resync_interval_seconds: u64,

    /// Delay before the next pass after a failed pass (seconds)
    pub retry_interval_seconds: u64,

    /// Deadline for a whole pass (seconds)
    pub pass_timeout_seconds: u64,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` and `/health`
    pub enabled: bool,

    /// Metrics bind address
    pub bind_addr: SocketAddr,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Show target in logs
    pub show_target: bool,

    /// Show thread IDs in logs
    pub show_thread_ids: bool,

    /// Show line numbers in logs
    pub show_line_numbers: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentSpecificConfig::default(),
            reconcile: ReconcileConfig::default(),
            probe: ProbeConfig::default(),
            inventory: InventoryConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AgentSpecificConfig {
    fn default() -> Self {
        Self {
            name: "cpulabel-agent".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::FailFast,
            resync_interval_seconds: 300,
            retry_interval_seconds: 30,
            pass_timeout_seconds: 600,
        }
    }
}

impl ReconcileConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_seconds)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_seconds)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9464)),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_line_numbers: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Configuration file: `path`, else `CPULABEL_CONFIG`, else the
    ///    first of `./cpulabel.yaml` and `/etc/cpulabel/config.yaml`
    /// 3. Defaults (lowest)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));
        Self::load_with_env(path.as_deref(), env_source())
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default()).map_err(config_error)?);

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                for path in DEFAULT_CONFIG_PATHS {
                    builder = builder.add_source(config::File::with_name(path).required(false));
                }
            }
        }

        let parsed: Self = builder
            .add_source(env)
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error)?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AgentConfig = serde_yaml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| AgentError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AgentError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.agent.name.is_empty() {
            return Err(AgentError::Config("Agent name cannot be empty".to_string()));
        }

        if self.agent.shutdown_timeout_seconds == 0 {
            return Err(AgentError::Config(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        let reconcile = &self.reconcile;
        for (name, value) in [
            ("resync_interval_seconds", reconcile.resync_interval_seconds),
            ("retry_interval_seconds", reconcile.retry_interval_seconds),
            ("pass_timeout_seconds", reconcile.pass_timeout_seconds),
        ] {
            if value == 0 {
                return Err(AgentError::Config(format!(
                    "reconcile.{} must be greater than 0",
                    name
                )));
            }
        }

        self.probe
            .validate()
            .map_err(|e| AgentError::Config(format!("Probe config validation failed: {}", e)))?;
        self.inventory.validate().map_err(|e| {
            AgentError::Config(format!("Inventory config validation failed: {}", e))
        })?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(AgentError::Config(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            _ => {
                return Err(AgentError::Config(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn config_error(e: config::ConfigError) -> AgentError {
    AgentError::Core(cpulabel_core::Error::from(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpulabel_inventory::InventoryBackend;
    use cpulabel_probe::{ParseMode, ProbeBackend};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.agent.name, "cpulabel-agent");
        assert_eq!(config.reconcile.policy, ReconcilePolicy::FailFast);
        assert_eq!(config.probe.command, "LC_ALL=C lscpu");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agent_config_validation() {
        let mut config = AgentConfig::default();
        config.agent.name = String::new();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.reconcile.retry_interval_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry_interval_seconds"));

        let mut config = AgentConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.inventory.path = None;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.probe.command = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpulabel.yaml");

        let mut config = AgentConfig::default();
        config.reconcile.policy = ReconcilePolicy::BestEffort;
        config.probe.parse_mode = ParseMode::Strict;
        config.to_file(&path).unwrap();

        let loaded = AgentConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpulabel.yaml");
        std::fs::write(
            &path,
            "reconcile:\n  resync_interval_seconds: 60\nprobe:\n  backend: mock\n  timeout_seconds: 5\n",
        )
        .unwrap();

        let config = AgentConfig::load_with_env(Some(&path), env(&[])).unwrap();
        assert_eq!(config.reconcile.resync_interval_seconds, 60);
        assert_eq!(config.reconcile.retry_interval_seconds, 30);
        assert_eq!(config.probe.backend, ProbeBackend::Mock);
        assert_eq!(config.probe.timeout_seconds, 5);
        assert_eq!(config.probe.command, "LC_ALL=C lscpu");
        assert_eq!(config.inventory.backend, InventoryBackend::File);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpulabel.yaml");
        std::fs::write(&path, "reconcile:\n  retry_interval_seconds: 10\n").unwrap();

        let config = AgentConfig::load_with_env(
            Some(&path),
            env(&[
                ("CPULABEL_RECONCILE__RETRY_INTERVAL_SECONDS", "45"),
                ("CPULABEL_RECONCILE__POLICY", "best_effort"),
                ("CPULABEL_LOGGING__FORMAT", "json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.reconcile.retry_interval_seconds, 45);
        assert_eq!(config.reconcile.policy, ReconcilePolicy::BestEffort);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_invalid_layered_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpulabel.yaml");
        std::fs::write(&path, "reconcile:\n  pass_timeout_seconds: 0\n").unwrap();

        assert!(AgentConfig::load_with_env(Some(&path), env(&[])).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(AgentConfig::load_with_env(Some(&path), env(&[])).is_err());
    }
}
