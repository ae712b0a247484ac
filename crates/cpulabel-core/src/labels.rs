//! The reserved node label managed by cpulabel
//!
//! cpulabel owns exactly one key on every node. Every other key in the node's
//! label map belongs to someone else and is never read or written here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved label key written on every node
pub const CPU_SPEED_LABEL: &str = "cpu-speed";

/// CPU tier derived from a node's CPU model string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuSpeed {
    /// Intel Xeon
    Fast,
    /// Intel Core
    Medium,
    /// Any other Intel part
    Slow,
    /// Not Intel, or the model could not be determined
    Unknown,
}

impl CpuSpeed {
    /// All label values, in classification order
    pub const ALL: [CpuSpeed; 4] = [
        CpuSpeed::Fast,
        CpuSpeed::Medium,
        CpuSpeed::Slow,
        CpuSpeed::Unknown,
    ];

    /// Label value as stored on the node
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuSpeed::Fast => "fast",
            CpuSpeed::Medium => "medium",
            CpuSpeed::Slow => "slow",
            CpuSpeed::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CpuSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CpuSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(CpuSpeed::Fast),
            "medium" => Ok(CpuSpeed::Medium),
            "slow" => Ok(CpuSpeed::Slow),
            "unknown" => Ok(CpuSpeed::Unknown),
            _ => Err(format!("Unknown cpu-speed label value: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_values_round_trip_through_str() {
        for speed in CpuSpeed::ALL {
            assert_eq!(speed.as_str().parse::<CpuSpeed>().unwrap(), speed);
        }
    }

    #[test]
    fn test_label_values_are_case_sensitive() {
        assert!("Fast".parse::<CpuSpeed>().is_err());
        assert!("".parse::<CpuSpeed>().is_err());
    }

    #[test]
    fn test_serde_uses_label_values() {
        let json = serde_json::to_string(&CpuSpeed::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
