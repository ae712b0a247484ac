//! CPU model signal collection

use crate::config::{ParseMode, ProbeConfig};
use crate::lscpu::extract_model_name;
use crate::transport::ProbeTransport;
use crate::ProbeError;
use async_trait::async_trait;
use cpulabel_core::{NodeName, RawSignal, Result, SignalSource};
use tracing::{debug, warn};

/// Signal source that probes a node over a transport and extracts its CPU model.
///
/// Nothing is cached: every call reaches the node.
#[derive(Debug, Clone)]
pub struct CpuSignalCollector<T> {
    transport: T,
    command: String,
    parse_mode: ParseMode,
}

impl<T: ProbeTransport> CpuSignalCollector<T> {
    pub fn new(transport: T, config: &ProbeConfig) -> Self {
        Self {
            transport,
            command: config.command.clone(),
            parse_mode: config.parse_mode,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn parse(&self, node: &NodeName, output: &str) -> Result<RawSignal> {
        match extract_model_name(output) {
            Some(model) => Ok(RawSignal::new(model)),
            None => match self.parse_mode {
                ParseMode::Lenient => {
                    warn!("No model line in probe output from {}, treating as empty", node);
                    Ok(RawSignal::default())
                }
                ParseMode::Strict => Err(ProbeError::MarkerMissing.into_core(node)),
            },
        }
    }
}

#[async_trait]
impl<T: ProbeTransport> SignalSource for CpuSignalCollector<T> {
    async fn collect(&self, node: &NodeName) -> Result<RawSignal> {
        debug!("Probing {} via {}", node, self.transport.name());

        let output = self
            .transport
            .run(node, &self.command)
            .await
            .map_err(|e| e.into_core(node))?;

        let signal = self.parse(node, &output)?;
        debug!("Node {} reports CPU model {:?}", node, signal.as_str());
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use cpulabel_core::{CpuSpeed, Error};

    fn collector(transport: MockTransport, parse_mode: ParseMode) -> CpuSignalCollector<MockTransport> {
        let config = ProbeConfig::default().with_parse_mode(parse_mode);
        CpuSignalCollector::new(transport, &config)
    }

    #[tokio::test]
    async fn test_collect_extracts_model() {
        let collector = collector(
            MockTransport::new().with_model("node1", "Intel(R) Xeon(R) CPU E5-2680 v4"),
            ParseMode::Lenient,
        );

        let signal = collector.collect(&NodeName::from("node1")).await.unwrap();
        assert_eq!(signal.as_str(), "Intel(R) Xeon(R) CPU E5-2680 v4");
        assert_eq!(signal.classify(), CpuSpeed::Fast);
    }

    #[tokio::test]
    async fn test_collect_sends_configured_command() {
        let collector = collector(
            MockTransport::new().with_model("node1", "Intel Core i5"),
            ParseMode::Lenient,
        );
        collector.collect(&NodeName::from("node1")).await.unwrap();

        let calls = collector.transport().calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_str(), "node1");
        assert_eq!(calls[0].1, "LC_ALL=C lscpu");
    }

    #[tokio::test]
    async fn test_lenient_missing_marker_is_empty_signal() {
        let collector = collector(
            MockTransport::new().with_output("node1", "Architecture: aarch64\n"),
            ParseMode::Lenient,
        );

        let signal = collector.collect(&NodeName::from("node1")).await.unwrap();
        assert!(signal.is_empty());
        assert_eq!(signal.classify(), CpuSpeed::Unknown);
    }

    #[tokio::test]
    async fn test_strict_missing_marker_is_parse_error() {
        let collector = collector(
            MockTransport::new().with_output("node1", "Architecture: aarch64\n"),
            ParseMode::Strict,
        );

        let err = collector.collect(&NodeName::from("node1")).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(err.node().map(|n| n.as_str()), Some("node1"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_probe_error() {
        let collector = collector(
            MockTransport::new().with_exit_status("node2", 255, "No route to host"),
            ParseMode::Lenient,
        );

        let err = collector.collect(&NodeName::from("node2")).await.unwrap_err();
        match err {
            Error::Probe { node, message } => {
                assert_eq!(node.as_str(), "node2");
                assert!(message.contains("No route to host"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
