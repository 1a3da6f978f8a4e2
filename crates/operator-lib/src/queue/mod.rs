//! Consumer-group backlog of the work queue
//!
//! Lag is the number of messages published to a topic that the consumer
//! group has not committed yet, summed over partitions.

mod exporter;
#[cfg(feature = "kafka")]
mod kafka;

pub use exporter::ExporterLagReader;
#[cfg(feature = "kafka")]
pub use kafka::KafkaLagReader;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel some clients report for a partition without a committed offset
pub const NO_COMMITTED_OFFSET: i64 = -1;

/// Consumer group and topic whose backlog is measured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueTarget {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub group_id: String,
    pub topic: String,
}

impl Default for QueueTarget {
    fn default() -> Self {
        Self {
            brokers: vec!["kafka-0.kafka.kafka.svc.cluster.local:9092".to_string()],
            client_id: "task-runner".to_string(),
            group_id: "task-group".to_string(),
            topic: "workload-run-topic".to_string(),
        }
    }
}

/// Source of consumer-group lag
#[async_trait]
pub trait QueueLag: Send + Sync {
    async fn lag(&self, target: &QueueTarget) -> Result<u64>;
}

/// Total lag across partitions.
///
/// `latest` holds the high watermark of every partition of the topic. A
/// partition missing from `committed`, or committed at `-1`, counts as
/// committed at offset 0.
pub fn compute_lag(latest: &HashMap<i32, i64>, committed: &HashMap<i32, i64>) -> u64 {
    let total: i64 = latest
        .iter()
        .map(|(partition, high)| {
            let done = match committed.get(partition) {
                Some(offset) if *offset != NO_COMMITTED_OFFSET => *offset,
                _ => 0,
            };
            high - done
        })
        .sum();
    total.max(0) as u64
}
