//! Carbon-window scale gate
//!
//! Inside an optimal window the worker deployment runs at its maximum size,
//! outside it shrinks to its minimum. A scale-down is held back while the
//! queue still has more than `queue_size_threshold` messages, except at
//! hour 0 where the backlog is never consulted.

use crate::error::{OperatorError, Result};
use crate::models::{in_any_window, ScalingDecision, Window, HOLD_REPLICAS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replica counts used inside and outside optimal windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaBounds {
    pub min: i32,
    pub max: i32,
}

impl Default for ReplicaBounds {
    fn default() -> Self {
        Self { min: 0, max: 5 }
    }
}

impl ReplicaBounds {
    pub fn validate(&self) -> Result<()> {
        if self.min < 0 || self.min > self.max {
            return Err(OperatorError::InvalidInput(format!(
                "replica bounds must satisfy 0 <= min <= max, got {}..{}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleThresholds {
    /// Largest backlog that still allows scaling down
    pub queue_size_threshold: u64,
}

impl Default for ScaleThresholds {
    fn default() -> Self {
        Self {
            queue_size_threshold: 30,
        }
    }
}

/// Deployment a decision applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleTarget {
    pub namespace: String,
    pub deployment: String,
}

impl Default for ScaleTarget {
    fn default() -> Self {
        Self {
            namespace: "testing".to_string(),
            deployment: "kafka-task-runner".to_string(),
        }
    }
}

/// Whether the backlog matters for a decision at `hour`
pub fn needs_backlog(hour: u32, in_window: bool) -> bool {
    !in_window && hour != 0
}

/// Decide the replica target for `hour`.
///
/// `backlog` is only read when [`needs_backlog`] holds; pass `None` when it
/// was not queried.
pub fn decide(
    now: DateTime<Utc>,
    hour: u32,
    windows: &[Window],
    backlog: Option<u64>,
    thresholds: &ScaleThresholds,
    bounds: &ReplicaBounds,
    target: &ScaleTarget,
) -> ScalingDecision {
    let in_window = in_any_window(windows, hour);

    let (target_replicas, reason) = match backlog {
        Some(depth)
            if needs_backlog(hour, in_window) && depth > thresholds.queue_size_threshold =>
        {
            (
                HOLD_REPLICAS,
                format!("Skipped scale-down due to queue size ({} messages)", depth),
            )
        }
        _ if in_window => (
            bounds.max,
            format!("Current hour ({}) is in optimal window", hour),
        ),
        _ => (
            bounds.min,
            format!("Current hour ({}) is NOT in optimal window", hour),
        ),
    };

    ScalingDecision {
        timestamp: now,
        hour,
        deployment: target.deployment.clone(),
        namespace: target.namespace.clone(),
        target_replicas,
        reason,
    }
}
