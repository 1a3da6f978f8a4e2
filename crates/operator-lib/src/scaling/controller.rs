//! Hourly scaling check

use super::{decide, needs_backlog, ReplicaBounds, ScaleTarget, ScaleThresholds};
use crate::carbon::{compute_windows, CarbonIntensitySource, WindowPolicy};
use crate::cluster::ClusterGateway;
use crate::error::{OperatorError, Result};
use crate::locks::DeploymentLocks;
use crate::models::{in_any_window, ScalingDecision, Window};
use crate::observability::{OperatorMetrics, StructuredLogger};
use crate::queue::{QueueLag, QueueTarget};
use crate::store::DecisionStore;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub target: ScaleTarget,
    pub bounds: ReplicaBounds,
    pub thresholds: ScaleThresholds,
    pub window_policy: WindowPolicy,
    pub queue: QueueTarget,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            target: ScaleTarget::default(),
            bounds: ReplicaBounds::default(),
            thresholds: ScaleThresholds::default(),
            window_policy: WindowPolicy::default(),
            queue: QueueTarget::default(),
        }
    }
}

/// Calendar key used for the window cache
pub fn date_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Scales the queue worker deployment around low-carbon windows
pub struct ScalingController {
    gateway: Arc<dyn ClusterGateway>,
    queue: Arc<dyn QueueLag>,
    carbon: Arc<dyn CarbonIntensitySource>,
    store: Arc<dyn DecisionStore>,
    locks: DeploymentLocks,
    config: ScalingConfig,
    metrics: OperatorMetrics,
    logger: StructuredLogger,
}

impl ScalingController {
    pub fn new(
        gateway: Arc<dyn ClusterGateway>,
        queue: Arc<dyn QueueLag>,
        carbon: Arc<dyn CarbonIntensitySource>,
        store: Arc<dyn DecisionStore>,
        locks: DeploymentLocks,
        config: ScalingConfig,
    ) -> Self {
        Self {
            gateway,
            queue,
            carbon,
            store,
            locks,
            config,
            metrics: OperatorMetrics::new(),
            logger: StructuredLogger::new("energy-operator"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Fetch fresh intensity data, select today's windows and store them
    pub async fn refresh_windows(&self, now: DateTime<Utc>) -> Result<Vec<Window>> {
        let date = date_key(now);
        let windows = compute_windows(self.carbon.as_ref(), &self.config.window_policy).await?;

        self.metrics.set_optimal_windows(windows.len() as i64);
        self.logger
            .log_windows_computed(&date, self.carbon.name(), &windows);

        if let Err(e) = self.store.put_windows(&date, &windows) {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!(error = %e, date = %date, "Failed to store optimal windows");
        }
        Ok(windows)
    }

    /// Today's windows from the store, recomputed when absent or unreadable
    pub async fn windows_for(&self, now: DateTime<Utc>) -> Result<Vec<Window>> {
        let date = date_key(now);
        match self.store.get_windows(&date) {
            Ok(Some(windows)) if !windows.is_empty() => {
                debug!(date = %date, count = windows.len(), "Using stored windows");
                return Ok(windows);
            }
            Ok(_) => info!(date = %date, "No optimal window data for today, fetching"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!(error = %e, date = %date, "Failed to read stored windows, recomputing"),
        }
        self.refresh_windows(now).await
    }

    /// Decide and apply the replica target for the hour of `now`
    pub async fn hourly_check(&self, now: DateTime<Utc>) -> Result<ScalingDecision> {
        let hour = now.hour();
        let windows = self.windows_for(now).await?;
        let in_window = in_any_window(&windows, hour);

        let backlog = if needs_backlog(hour, in_window) {
            let lag = self
                .queue
                .lag(&self.config.queue)
                .await
                .map_err(|e| self.unit_failed(e))?;
            self.metrics.set_queue_backlog(lag as i64);
            debug!(lag, "Current consumer lag");
            Some(lag)
        } else {
            None
        };

        let decision = decide(
            now,
            hour,
            &windows,
            backlog,
            &self.config.thresholds,
            &self.config.bounds,
            &self.config.target,
        );

        let target = &self.config.target;
        let scaled = {
            let _guard = self.locks.acquire(&target.namespace, &target.deployment).await;
            if decision.is_hold() {
                Ok(())
            } else {
                self.gateway
                    .replace_deployment_replicas(
                        &target.namespace,
                        &target.deployment,
                        decision.target_replicas,
                    )
                    .await
                    .map_err(|e| self.unit_failed(e))
            }
        };

        self.logger.log_scaling_decision(&decision);
        if scaled.is_ok() {
            self.metrics.inc_scaling_decisions(action_label(&decision, &self.config.bounds));
            self.metrics
                .set_target_replicas(decision.target_replicas as i64);
        }

        // the decision is recorded even when the scale call failed
        if let Err(e) = self.store.append_event(&decision) {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!(error = %e, "Failed to record scaling event");
        }

        scaled?;
        Ok(decision)
    }

    fn unit_failed(&self, error: OperatorError) -> OperatorError {
        self.metrics.inc_unit_failures(error.component());
        self.logger.log_unit_failure(
            &format!(
                "{}/{}",
                self.config.target.namespace, self.config.target.deployment
            ),
            &error,
        );
        error
    }
}

fn action_label(decision: &ScalingDecision, bounds: &ReplicaBounds) -> &'static str {
    if decision.is_hold() {
        "hold"
    } else if decision.target_replicas == bounds.max {
        "scale_up"
    } else {
        "scale_down"
    }
}
