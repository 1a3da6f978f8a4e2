//! Battery trend classification

use crate::models::{BatteryTrend, NodeBatteryTrend};

/// Level change (percentage points) a trend has to exceed
pub const TREND_DEADBAND: f64 = 2.0;

/// Classify a node from its recent `(timestamp, level)` history.
///
/// Only the first and last samples matter. With fewer than two samples the
/// node is `Stable` at its last known level, or 0 with no samples at all.
pub fn classify(node: &str, history: &[(f64, f64)]) -> NodeBatteryTrend {
    let current_level = history.last().map(|(_, level)| *level).unwrap_or(0.0);

    let trend = match (history.first(), history.len()) {
        (Some((_, first)), n) if n >= 2 => {
            let delta = current_level - first;
            if delta > TREND_DEADBAND {
                BatteryTrend::Rising
            } else if delta < -TREND_DEADBAND {
                BatteryTrend::Falling
            } else {
                BatteryTrend::Stable
            }
        }
        _ => BatteryTrend::Stable,
    };

    NodeBatteryTrend {
        node: node.to_string(),
        current_level,
        trend,
    }
}

/// Battery level a node must reach before workloads are moved onto it.
///
/// A rising battery raises the bar and a falling one lowers it.
pub fn adjusted_threshold(base: f64, offset: f64, trend: BatteryTrend) -> f64 {
    base + offset * trend.sign()
}
