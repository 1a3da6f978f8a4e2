//! Periodic control loop driving the placement and scaling controllers

mod r#loop;

pub use r#loop::{until_next_hour, ControlLoop, ControlLoopBuilder, LoopConfig, PassOutcome};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which controller a loop drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Battery-aware node affinity for active deployments
    NodeAffinity,
    /// Carbon-window scaling of the queue worker deployment
    QueueScaling,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::NodeAffinity => "node_affinity",
            EngineMode::QueueScaling => "queue_scaling",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "node_affinity" => Ok(EngineMode::NodeAffinity),
            "queue_scaling" => Ok(EngineMode::QueueScaling),
            other => Err(format!("unknown engine mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("node_affinity".parse::<EngineMode>(), Ok(EngineMode::NodeAffinity));
        assert_eq!("Queue-Scaling".parse::<EngineMode>(), Ok(EngineMode::QueueScaling));
        assert!("both".parse::<EngineMode>().is_err());
    }

    #[test]
    fn test_mode_serde_matches_display() {
        let json = serde_json::to_string(&EngineMode::QueueScaling).unwrap();
        assert_eq!(json, format!("\"{}\"", EngineMode::QueueScaling));
    }
}
