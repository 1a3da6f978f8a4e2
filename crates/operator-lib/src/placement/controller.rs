//! Battery-aware placement pass

use super::apply_intent;
use crate::battery::{adjusted_threshold, BatteryMonitor};
use crate::cluster::{active_deployments, solar_nodes, ClusterGateway};
use crate::error::{OperatorError, Result};
use crate::locks::DeploymentLocks;
use crate::models::{AffinityIntent, AffinityMode, NodeBatteryTrend, PlacementAction, PlacementEvent};
use crate::observability::{OperatorMetrics, StructuredLogger};
use crate::store::{DecisionStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Placement knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Namespaces scanned for active deployments
    pub namespaces: Vec<String>,
    /// Node label marking solar-powered nodes
    pub solar_label_key: String,
    pub solar_label_value: String,
    /// Node label the affinity terms select on
    pub selector_key: String,
    /// Battery percentage a stable node needs to receive workloads
    pub base_threshold: f64,
    /// Threshold shift applied for a rising or falling battery
    pub threshold_offset: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            namespaces: vec!["testing".to_string()],
            solar_label_key: "power".to_string(),
            solar_label_value: "solar".to_string(),
            selector_key: "kubernetes.io/hostname".to_string(),
            base_threshold: 20.0,
            threshold_offset: 5.0,
        }
    }
}

/// Result of one (deployment, node) decision
#[derive(Debug)]
pub struct PlacementOutcome {
    pub deployment: String,
    pub namespace: String,
    pub node: String,
    pub mode: AffinityMode,
    pub result: Result<PlacementAction>,
}

/// Everything one pass did
#[derive(Debug, Default)]
pub struct PlacementReport {
    pub solar_nodes: usize,
    pub deployments: usize,
    pub outcomes: Vec<PlacementOutcome>,
    /// `(deployment, node)` pairs skipped for lack of battery data
    pub missing_battery: Vec<(String, String)>,
}

impl PlacementReport {
    pub fn failures(&self) -> impl Iterator<Item = (&PlacementOutcome, &OperatorError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(PlacementAction::Applied)))
            .count()
    }
}

/// Moves active deployments toward the first solar node with enough battery
pub struct PlacementController {
    gateway: Arc<dyn ClusterGateway>,
    monitor: Arc<BatteryMonitor>,
    store: Arc<dyn DecisionStore>,
    locks: DeploymentLocks,
    config: PlacementConfig,
    metrics: OperatorMetrics,
    logger: StructuredLogger,
}

impl PlacementController {
    pub fn new(
        gateway: Arc<dyn ClusterGateway>,
        monitor: Arc<BatteryMonitor>,
        store: Arc<dyn DecisionStore>,
        locks: DeploymentLocks,
        config: PlacementConfig,
    ) -> Self {
        Self {
            gateway,
            monitor,
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

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// One placement pass.
    ///
    /// Solar nodes are tried in listing order for every active deployment.
    /// The first node whose battery clears its adjusted threshold is
    /// preferred and ends the search; every node tried before it is avoided.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PlacementReport> {
        let nodes = self.gateway.list_nodes().await?;
        let solar = solar_nodes(
            &nodes,
            &self.config.solar_label_key,
            &self.config.solar_label_value,
        );

        let mut report = PlacementReport {
            solar_nodes: solar.len(),
            ..Default::default()
        };
        if solar.is_empty() {
            info!("No solar-powered nodes found");
            return Ok(report);
        }

        let trends = self.monitor.trends(now).await?;
        let deployments = active_deployments(self.gateway.as_ref(), &self.config.namespaces).await?;
        report.deployments = deployments.len();

        for deployment in &deployments {
            let _guard = self
                .locks
                .acquire(&deployment.namespace, &deployment.deployment_name)
                .await;

            for node in &solar {
                let Some(trend) = trends.iter().find(|t| &t.node == node) else {
                    self.metrics.inc_missing_data();
                    self.logger
                        .log_missing_battery(&deployment.deployment_name, node);
                    report
                        .missing_battery
                        .push((deployment.deployment_name.clone(), node.clone()));
                    continue;
                };

                let threshold = adjusted_threshold(
                    self.config.base_threshold,
                    self.config.threshold_offset,
                    trend.trend,
                );
                let mode = if trend.current_level >= threshold {
                    AffinityMode::Prefer
                } else {
                    AffinityMode::Avoid
                };
                debug!(
                    node = %node,
                    battery_level = trend.current_level,
                    trend = %trend.trend,
                    adjusted_threshold = threshold,
                    "Evaluated solar node"
                );

                let intent = AffinityIntent {
                    deployment: deployment.deployment_name.clone(),
                    namespace: deployment.namespace.clone(),
                    target_node: node.clone(),
                    mode,
                };
                let result = self.decide(&intent, trend, threshold, now).await;
                if let Err(OperatorError::Store(e)) = &result {
                    if e.is_fatal() {
                        return Err(OperatorError::Store(StoreError::Closed));
                    }
                }
                report.outcomes.push(PlacementOutcome {
                    deployment: intent.deployment,
                    namespace: intent.namespace,
                    node: intent.target_node,
                    mode,
                    result,
                });

                if mode == AffinityMode::Prefer {
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn decide(
        &self,
        intent: &AffinityIntent,
        trend: &NodeBatteryTrend,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<PlacementAction> {
        let action = match apply_intent(self.gateway.as_ref(), intent, &self.config.selector_key, now)
            .await
        {
            Ok(action) => action,
            Err(e) => {
                self.metrics.inc_unit_failures(e.component());
                self.logger.log_unit_failure(
                    &format!("{}/{}@{}", intent.namespace, intent.deployment, intent.target_node),
                    &e,
                );
                return Err(e);
            }
        };

        if action == PlacementAction::Applied {
            self.metrics.inc_affinity_patches(&intent.mode.to_string());
        }

        let event = PlacementEvent {
            timestamp: now,
            deployment: intent.deployment.clone(),
            namespace: intent.namespace.clone(),
            node: intent.target_node.clone(),
            mode: intent.mode,
            battery_level: trend.current_level,
            trend: trend.trend,
            adjusted_threshold: threshold,
            action,
        };
        self.logger.log_placement(&event);

        if let Err(e) = self.store.append_placement(&event) {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!(error = %e, deployment = %intent.deployment, "Failed to record placement event");
        }

        Ok(action)
    }
}
