//! Battery telemetry for solar nodes

use super::classify;
use crate::error::{OperatorError, Result};
use crate::models::{BatteryTrend, NodeBatteryTrend};
use crate::telemetry::{by_label, label_value, Telemetry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Labels that carry the node name, in order of preference
pub const NODE_LABELS: &[&str] = &["node", "instance"];

/// Name used for series without any node label
pub const UNKNOWN_NODE: &str = "unknown-node";

/// Reads battery levels and their recent direction through PromQL
pub struct BatteryMonitor {
    telemetry: Arc<dyn Telemetry>,
    query: String,
    lookback: Duration,
    step: Duration,
}

impl BatteryMonitor {
    pub fn new(
        telemetry: Arc<dyn Telemetry>,
        query: impl Into<String>,
        lookback: Duration,
        step: Duration,
    ) -> Self {
        Self {
            telemetry,
            query: query.into(),
            lookback,
            step,
        }
    }

    /// Current level and trend of every node reporting the battery metric
    pub async fn trends(&self, now: DateTime<Utc>) -> Result<Vec<NodeBatteryTrend>> {
        let lookback = chrono::Duration::from_std(self.lookback)
            .map_err(|e| OperatorError::Config(format!("invalid battery lookback: {}", e)))?;
        let start = now - lookback;

        let (current, history) = tokio::try_join!(
            self.telemetry.query_instant(&self.query),
            self.telemetry
                .query_range(&self.query, start, now, self.step),
        )?;

        let current_levels = by_label(&current, NODE_LABELS, UNKNOWN_NODE);
        let mut trends: BTreeMap<String, NodeBatteryTrend> = BTreeMap::new();

        for series in &history {
            let node = label_value(&series.labels, NODE_LABELS).unwrap_or(UNKNOWN_NODE);
            let trend = if series.points.len() < 2 {
                NodeBatteryTrend {
                    node: node.to_string(),
                    current_level: current_levels.get(node).copied().unwrap_or(0.0),
                    trend: BatteryTrend::Stable,
                }
            } else {
                classify(node, &series.points)
            };
            trends.insert(node.to_string(), trend);
        }

        // a level with no history is reported as missing data by the caller
        for node in current_levels.keys().filter(|n| !trends.contains_key(*n)) {
            debug!(node = %node, "Battery level without history, skipping");
        }

        debug!(nodes = trends.len(), "Fetched battery trends");
        Ok(trends.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTelemetry;

    fn monitor(telemetry: MockTelemetry) -> BatteryMonitor {
        BatteryMonitor::new(
            Arc::new(telemetry),
            "node_solar_battery_level",
            Duration::from_secs(300),
            Duration::from_secs(60),
        )
    }

    fn find<'a>(trends: &'a [NodeBatteryTrend], node: &str) -> &'a NodeBatteryTrend {
        trends.iter().find(|t| t.node == node).unwrap()
    }

    #[tokio::test]
    async fn test_trends_per_node() {
        let telemetry = MockTelemetry::new()
            .with_battery("solar-1", &[50.0, 51.0, 54.0])
            .with_battery("solar-2", &[80.0, 70.0])
            .with_battery("solar-3", &[30.0]);

        let trends = monitor(telemetry).trends(Utc::now()).await.unwrap();

        assert_eq!(trends.len(), 3);
        assert_eq!(find(&trends, "solar-1").trend, BatteryTrend::Rising);
        assert_eq!(find(&trends, "solar-1").current_level, 54.0);
        assert_eq!(find(&trends, "solar-2").trend, BatteryTrend::Falling);
        assert_eq!(find(&trends, "solar-3").trend, BatteryTrend::Stable);
        assert_eq!(find(&trends, "solar-3").current_level, 30.0);
    }

    #[tokio::test]
    async fn test_instant_only_node_has_no_trend() {
        let telemetry = MockTelemetry::new()
            .with_battery("solar-1", &[60.0, 61.0])
            .with_instant_level("solar-9", 42.0);

        let trends = monitor(telemetry).trends(Utc::now()).await.unwrap();

        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].node, "solar-1");
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let telemetry = MockTelemetry::new().failing();
        let err = monitor(telemetry).trends(Utc::now()).await.unwrap_err();
        assert!(matches!(err, OperatorError::Telemetry(_)));
    }
}
