//! Lag read directly from the brokers

use super::{compute_lag, QueueLag, QueueTarget};
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::TopicPartitionList;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Queries watermarks and committed offsets with a short-lived consumer
pub struct KafkaLagReader {
    timeout: Duration,
}

impl KafkaLagReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for KafkaLagReader {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

fn queue_err(e: impl std::fmt::Display) -> OperatorError {
    OperatorError::Queue(e.to_string())
}

fn read_offsets(target: &QueueTarget, timeout: Duration) -> Result<u64> {
    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", target.brokers.join(","))
        .set("client.id", &target.client_id)
        .set("group.id", &target.group_id)
        .set("enable.auto.commit", "false")
        .create()
        .map_err(queue_err)?;

    let metadata = consumer
        .fetch_metadata(Some(&target.topic), timeout)
        .map_err(queue_err)?;
    let topic = metadata
        .topics()
        .iter()
        .find(|t| t.name() == target.topic)
        .ok_or_else(|| OperatorError::Queue(format!("topic {} not found", target.topic)))?;

    let mut latest = HashMap::new();
    let mut partitions = TopicPartitionList::new();
    for partition in topic.partitions() {
        let (_, high) = consumer
            .fetch_watermarks(&target.topic, partition.id(), timeout)
            .map_err(queue_err)?;
        latest.insert(partition.id(), high);
        partitions.add_partition(&target.topic, partition.id());
    }

    let committed: HashMap<i32, i64> = consumer
        .committed_offsets(partitions, timeout)
        .map_err(queue_err)?
        .elements()
        .iter()
        .filter_map(|e| e.offset().to_raw().map(|offset| (e.partition(), offset)))
        .collect();

    Ok(compute_lag(&latest, &committed))
}

#[async_trait]
impl QueueLag for KafkaLagReader {
    async fn lag(&self, target: &QueueTarget) -> Result<u64> {
        let target = target.clone();
        let timeout = self.timeout;
        let topic = target.topic.clone();

        let lag = tokio::task::spawn_blocking(move || read_offsets(&target, timeout))
            .await
            .map_err(queue_err)??;

        debug!(%topic, lag, "Computed consumer lag from brokers");
        Ok(lag)
    }
}
