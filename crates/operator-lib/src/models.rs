//! Core data models for the energy operator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of hour slots in a normalized daily series
pub const HOURS_PER_DAY: usize = 24;

/// Replica target recorded when the operator explicitly decided not to scale
pub const HOLD_REPLICAS: i32 = -1;

/// One carbon-intensity (or any other) value for an hour of the day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyValue {
    pub hour: u32,
    pub value: f64,
}

impl HourlyValue {
    pub fn new(hour: u32, value: f64) -> Self {
        Self { hour, value }
    }
}

/// A contiguous run of low-intensity hours, inclusive on both ends.
///
/// `start > end` means the window wraps across midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub start: u32,
    pub end: u32,
    pub avg_intensity: f64,
    pub length: u32,
}

impl Window {
    /// Whether the window wraps across midnight
    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// Inclusive membership test that understands wrapped windows
    pub fn contains(&self, hour: u32) -> bool {
        if self.wraps() {
            hour >= self.start || hour <= self.end
        } else {
            hour >= self.start && hour <= self.end
        }
    }

    /// Hours covered by the window, in chronological order
    pub fn hours(&self) -> Vec<u32> {
        if self.wraps() {
            (self.start..HOURS_PER_DAY as u32).chain(0..=self.end).collect()
        } else {
            (self.start..=self.end).collect()
        }
    }
}

/// Whether `hour` falls inside any of the given windows
pub fn in_any_window(windows: &[Window], hour: u32) -> bool {
    windows.iter().any(|w| w.contains(hour))
}

/// Windows computed for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWindowSet {
    /// Calendar date formatted `YYYY-MM-DD`
    pub date: String,
    pub windows: Vec<Window>,
}

/// Direction a node battery is moving in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryTrend {
    Rising,
    Falling,
    Stable,
}

impl BatteryTrend {
    /// Sign applied to the threshold offset
    pub fn sign(&self) -> f64 {
        match self {
            BatteryTrend::Rising => 1.0,
            BatteryTrend::Falling => -1.0,
            BatteryTrend::Stable => 0.0,
        }
    }
}

impl std::fmt::Display for BatteryTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryTrend::Rising => write!(f, "rising"),
            BatteryTrend::Falling => write!(f, "falling"),
            BatteryTrend::Stable => write!(f, "stable"),
        }
    }
}

/// Battery level and direction of a single node, recomputed every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBatteryTrend {
    pub node: String,
    pub current_level: f64,
    pub trend: BatteryTrend,
}

/// Placement intent for a deployment relative to one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityMode {
    /// Schedule onto the node when possible
    Prefer,
    /// Never schedule onto the node
    Avoid,
}

impl std::fmt::Display for AffinityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AffinityMode::Prefer => write!(f, "prefer"),
            AffinityMode::Avoid => write!(f, "avoid"),
        }
    }
}

/// Declarative placement the operator wants for a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityIntent {
    pub deployment: String,
    pub namespace: String,
    pub target_node: String,
    pub mode: AffinityMode,
}

/// Scaling decision, also the persisted audit record.
///
/// `target_replicas == HOLD_REPLICAS` records an explicit hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingDecision {
    pub timestamp: DateTime<Utc>,
    pub hour: u32,
    pub deployment: String,
    pub namespace: String,
    pub target_replicas: i32,
    pub reason: String,
}

impl ScalingDecision {
    pub fn is_hold(&self) -> bool {
        self.target_replicas == HOLD_REPLICAS
    }
}

/// Persisted scaling decision with its sequence id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingEvent {
    pub id: u64,
    #[serde(flatten)]
    pub decision: ScalingDecision,
}

/// What an affinity decision did to the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementAction {
    /// A patch was written
    Applied,
    /// The live spec already matched the intent
    Unchanged,
}

/// Audit record of one affinity decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementEvent {
    pub timestamp: DateTime<Utc>,
    pub deployment: String,
    pub namespace: String,
    pub node: String,
    pub mode: AffinityMode,
    pub battery_level: f64,
    pub trend: BatteryTrend,
    pub adjusted_threshold: f64,
    pub action: PlacementAction,
}

/// Node as seen through the cluster gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Deployment that currently has running pods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub namespace: String,
    pub deployment_name: String,
    pub pod_count: usize,
}
