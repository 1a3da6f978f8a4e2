//! Observability infrastructure for the operator
//!
//! Provides:
//! - Prometheus metrics (pass latency, patches, scaling decisions, failures, backlog)
//! - Structured JSON logging with tracing

use crate::error::OperatorError;
use crate::models::{PlacementAction, PlacementEvent, ScalingDecision, Window};
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for decision pass latency (in seconds)
const PASS_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<OperatorMetricsInner> = OnceLock::new();

struct OperatorMetricsInner {
    pass_latency_seconds: HistogramVec,
    affinity_patches: IntCounterVec,
    scaling_decisions: IntCounterVec,
    unit_failures: IntCounterVec,
    missing_data: IntCounter,
    optimal_windows: IntGauge,
    queue_backlog: IntGauge,
    target_replicas: IntGauge,
}

impl OperatorMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram_vec!(
                "energy_operator_pass_latency_seconds",
                "Time spent in one decision pass",
                &["mode"],
                PASS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_latency_seconds"),

            affinity_patches: register_int_counter_vec!(
                "energy_operator_affinity_patches_total",
                "Affinity patches written to deployments",
                &["mode"]
            )
            .expect("Failed to register affinity_patches"),

            scaling_decisions: register_int_counter_vec!(
                "energy_operator_scaling_decisions_total",
                "Scaling decisions taken",
                &["action"]
            )
            .expect("Failed to register scaling_decisions"),

            unit_failures: register_int_counter_vec!(
                "energy_operator_unit_failures_total",
                "Units of work skipped after a collaborator failure",
                &["component"]
            )
            .expect("Failed to register unit_failures"),

            missing_data: register_int_counter!(
                "energy_operator_missing_data_total",
                "Decisions skipped for lack of telemetry"
            )
            .expect("Failed to register missing_data"),

            optimal_windows: register_int_gauge!(
                "energy_operator_optimal_windows",
                "Number of optimal windows for the current day"
            )
            .expect("Failed to register optimal_windows"),

            queue_backlog: register_int_gauge!(
                "energy_operator_queue_backlog_messages",
                "Last observed consumer-group lag"
            )
            .expect("Failed to register queue_backlog"),

            target_replicas: register_int_gauge!(
                "energy_operator_target_replicas",
                "Replica count of the last scaling decision, -1 for hold"
            )
            .expect("Failed to register target_replicas"),
        }
    }
}

/// Operator metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct OperatorMetrics {
    _private: (),
}

impl Default for OperatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OperatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OperatorMetricsInner {
        GLOBAL_METRICS.get_or_init(OperatorMetricsInner::new)
    }

    pub fn observe_pass_latency(&self, mode: &str, duration_secs: f64) {
        self.inner()
            .pass_latency_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    pub fn inc_affinity_patches(&self, mode: &str) {
        self.inner()
            .affinity_patches
            .with_label_values(&[mode])
            .inc();
    }

    /// `action` is one of `scale_up`, `scale_down`, `hold`
    pub fn inc_scaling_decisions(&self, action: &str) {
        self.inner()
            .scaling_decisions
            .with_label_values(&[action])
            .inc();
    }

    pub fn inc_unit_failures(&self, component: &str) {
        self.inner()
            .unit_failures
            .with_label_values(&[component])
            .inc();
    }

    pub fn inc_missing_data(&self) {
        self.inner().missing_data.inc();
    }

    pub fn set_optimal_windows(&self, count: i64) {
        self.inner().optimal_windows.set(count);
    }

    pub fn set_queue_backlog(&self, messages: i64) {
        self.inner().queue_backlog.set(messages);
    }

    pub fn set_target_replicas(&self, replicas: i64) {
        self.inner().target_replicas.set(replicas);
    }
}

/// Structured logger for operator events
#[derive(Clone)]
pub struct StructuredLogger {
    operator: String,
}

impl StructuredLogger {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
        }
    }

    pub fn log_startup(&self, version: &str, modes: &str) {
        info!(
            event = "operator_started",
            operator = %self.operator,
            operator_version = %version,
            modes = %modes,
            "Energy operator started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "operator_shutdown",
            operator = %self.operator,
            reason = %reason,
            "Energy operator shutting down"
        );
    }

    pub fn log_windows_computed(&self, date: &str, source: &str, windows: &[Window]) {
        let summary = windows
            .iter()
            .map(|w| format!("{}-{} ({}h, avg {})", w.start, w.end, w.length, w.avg_intensity))
            .collect::<Vec<_>>()
            .join(", ");

        info!(
            event = "windows_computed",
            operator = %self.operator,
            date = %date,
            source = %source,
            count = windows.len(),
            windows = %summary,
            "Computed optimal execution windows"
        );
    }

    pub fn log_scaling_decision(&self, decision: &ScalingDecision) {
        if decision.is_hold() {
            warn!(
                event = "scaling_held",
                operator = %self.operator,
                deployment = %decision.deployment,
                namespace = %decision.namespace,
                hour = decision.hour,
                reason = %decision.reason,
                "Not scaling down, queue still has backlog"
            );
        } else {
            info!(
                event = "scaling_decision",
                operator = %self.operator,
                deployment = %decision.deployment,
                namespace = %decision.namespace,
                hour = decision.hour,
                target_replicas = decision.target_replicas,
                reason = %decision.reason,
                "Scaling deployment"
            );
        }
    }

    pub fn log_placement(&self, event: &PlacementEvent) {
        match event.action {
            PlacementAction::Applied => info!(
                event = "affinity_applied",
                operator = %self.operator,
                deployment = %event.deployment,
                namespace = %event.namespace,
                node = %event.node,
                mode = %event.mode,
                battery_level = event.battery_level,
                trend = %event.trend,
                adjusted_threshold = event.adjusted_threshold,
                "Deployment affinity updated"
            ),
            PlacementAction::Unchanged => info!(
                event = "affinity_unchanged",
                operator = %self.operator,
                deployment = %event.deployment,
                namespace = %event.namespace,
                node = %event.node,
                mode = %event.mode,
                "Deployment already has the desired affinity"
            ),
        }
    }

    pub fn log_missing_battery(&self, deployment: &str, node: &str) {
        warn!(
            event = "battery_data_missing",
            operator = %self.operator,
            deployment = %deployment,
            node = %node,
            "No battery data found for node, skipping"
        );
    }

    pub fn log_unit_failure(&self, unit: &str, error: &OperatorError) {
        warn!(
            event = "unit_failed",
            operator = %self.operator,
            unit = %unit,
            component = error.component(),
            error = %error,
            "Skipping unit after failure"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_metrics_creation() {
        let metrics = OperatorMetrics::new();

        metrics.observe_pass_latency("node_affinity", 0.2);
        metrics.inc_affinity_patches("prefer");
        metrics.inc_scaling_decisions("hold");
        metrics.inc_unit_failures("cluster");
        metrics.inc_missing_data();
        metrics.set_optimal_windows(2);
        metrics.set_queue_backlog(50);
        metrics.set_target_replicas(-1);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "energy_operator_scaling_decisions_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("energy-operator");
        assert_eq!(logger.operator, "energy-operator");
    }
}
