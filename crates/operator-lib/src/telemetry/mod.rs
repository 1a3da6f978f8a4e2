//! Telemetry queries
//!
//! The operator reads node battery levels and, by default, consumer lag
//! through PromQL. `Telemetry` is the seam; `PrometheusClient` talks to the
//! Prometheus HTTP API.

mod prometheus;

pub use self::prometheus::PrometheusClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// One series of an instant vector
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSample {
    pub labels: HashMap<String, String>,
    pub timestamp: f64,
    pub value: f64,
}

/// One series of a range vector, points sorted by timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSeries {
    pub labels: HashMap<String, String>,
    pub points: Vec<(f64, f64)>,
}

/// First present label among `keys`
pub fn label_value<'a>(labels: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| labels.get(*key))
        .map(String::as_str)
}

/// Instant samples keyed by the first present label among `keys`
pub fn by_label(samples: &[InstantSample], keys: &[&str], fallback: &str) -> HashMap<String, f64> {
    samples
        .iter()
        .map(|s| {
            let key = label_value(&s.labels, keys).unwrap_or(fallback).to_string();
            (key, s.value)
        })
        .collect()
}

/// PromQL query capability
#[async_trait]
pub trait Telemetry: Send + Sync {
    /// Evaluate an instant query
    async fn query_instant(&self, expr: &str) -> Result<Vec<InstantSample>>;

    /// Evaluate a range query over `[start, end]` at `step` resolution
    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<RangeSeries>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(labels: &[(&str, &str)], value: f64) -> InstantSample {
        InstantSample {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timestamp: 0.0,
            value,
        }
    }

    #[test]
    fn test_by_label_prefers_first_key() {
        let samples = vec![
            sample(&[("node", "solar-1"), ("instance", "10.0.0.1:9100")], 80.0),
            sample(&[("instance", "10.0.0.2:9100")], 40.0),
            sample(&[], 10.0),
        ];

        let map = by_label(&samples, &["node", "instance"], "unknown-node");
        assert_eq!(map["solar-1"], 80.0);
        assert_eq!(map["10.0.0.2:9100"], 40.0);
        assert_eq!(map["unknown-node"], 10.0);
    }
}
