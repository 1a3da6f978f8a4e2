//! Lag from kafka-exporter metrics scraped by Prometheus

use super::{compute_lag, QueueLag, QueueTarget};
use crate::error::{OperatorError, Result};
use crate::telemetry::{InstantSample, Telemetry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Reads partition offsets exported by kafka-exporter.
///
/// The high watermarks come from `kafka_topic_partition_current_offset` and
/// the committed offsets from `kafka_consumergroup_current_offset`.
pub struct ExporterLagReader {
    telemetry: Arc<dyn Telemetry>,
}

impl ExporterLagReader {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self { telemetry }
    }

    async fn partition_offsets(&self, expr: &str) -> Result<HashMap<i32, i64>> {
        let samples = self
            .telemetry
            .query_instant(expr)
            .await
            .map_err(|e| OperatorError::Queue(e.to_string()))?;
        samples.iter().map(partition_offset).collect()
    }
}

fn partition_offset(sample: &InstantSample) -> Result<(i32, i64)> {
    let partition = sample
        .labels
        .get("partition")
        .and_then(|p| p.parse::<i32>().ok())
        .ok_or_else(|| OperatorError::Queue("offset series without partition label".to_string()))?;
    Ok((partition, sample.value as i64))
}

#[async_trait]
impl QueueLag for ExporterLagReader {
    async fn lag(&self, target: &QueueTarget) -> Result<u64> {
        let latest_expr = format!(
            "kafka_topic_partition_current_offset{{topic=\"{}\"}}",
            target.topic
        );
        let committed_expr = format!(
            "kafka_consumergroup_current_offset{{consumergroup=\"{}\",topic=\"{}\"}}",
            target.group_id, target.topic
        );

        let latest = self.partition_offsets(&latest_expr).await?;
        if latest.is_empty() {
            return Err(OperatorError::Queue(format!(
                "no offsets exported for topic {}",
                target.topic
            )));
        }
        let committed = self.partition_offsets(&committed_expr).await?;

        let lag = compute_lag(&latest, &committed);
        debug!(topic = %target.topic, group = %target.group_id, lag, "Computed consumer lag");
        Ok(lag)
    }
}
