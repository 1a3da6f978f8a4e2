//! Collaborator health as seen by the control loops
//!
//! Each loop pass reports what happened to the collaborators it touched;
//! `/healthz` serves the worst status and `/readyz` additionally requires
//! startup to have finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Some calls failed or data was missing; passes still complete
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            updated_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }

    /// Health of a component after a pass in which `failed` of `attempted`
    /// calls against it failed
    pub fn from_failures(failed: usize, attempted: usize, last_error: Option<&str>) -> Self {
        if failed == 0 {
            return Self::healthy();
        }
        let message = format!(
            "{}/{} calls failed{}",
            failed,
            attempted,
            last_error.map(|e| format!(": {}", e)).unwrap_or_default()
        );
        if failed >= attempted {
            Self::unhealthy(message)
        } else {
            Self::degraded(message)
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    pub const TELEMETRY: &str = "telemetry";
    pub const CLUSTER: &str = "cluster";
    pub const QUEUE: &str = "queue";
    pub const CARBON_FEED: &str = "carbon_feed";
    pub const STORE: &str = "store";
    /// The control loops themselves; unhealthy once a loop has stopped
    pub const ENGINE: &str = "engine";

    /// Every component the operator binary registers at startup
    pub const ALL: &[&str] = &[TELEMETRY, CLUSTER, QUEUE, CARBON_FEED, STORE, ENGINE];
}

#[derive(Debug, Default)]
struct State {
    components: HashMap<String, ComponentHealth>,
    started: bool,
}

/// Shared between the loops (writers) and the API (reader)
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `name` as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn register_all(&self, names: &[&str]) {
        let mut state = self.state.write().await;
        for name in names {
            state
                .components
                .insert(name.to_string(), ComponentHealth::healthy());
        }
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Flipped on once the loops are running and off again at shutdown
    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.started = ready;
    }

    pub async fn health(&self) -> HealthReport {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthReport { status, components }
    }

    pub async fn readiness(&self) -> Readiness {
        let state = self.state.read().await;
        if !state.started {
            return Readiness {
                ready: false,
                reason: Some("Operator not started".to_string()),
            };
        }

        let mut unhealthy: Vec<&str> = state
            .components
            .iter()
            .filter(|(_, c)| c.status == ComponentStatus::Unhealthy)
            .map(|(name, _)| name.as_str())
            .collect();
        if unhealthy.is_empty() {
            return Readiness {
                ready: true,
                reason: None,
            };
        }
        unhealthy.sort_unstable();
        Readiness {
            ready: false,
            reason: Some(format!("Unhealthy: {}", unhealthy.join(", "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let report = registry.health().await;

        assert_eq!(report.status, ComponentStatus::Healthy);
        assert!(report.components.is_empty());
    }

    #[tokio::test]
    async fn test_overall_status_is_the_worst_component() {
        let registry = HealthRegistry::new();
        registry.register_all(components::ALL).await;
        assert_eq!(registry.health().await.components.len(), components::ALL.len());

        registry
            .set_degraded(components::TELEMETRY, "No battery series for node solar-1")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry
            .set_unhealthy(components::CLUSTER, "Cannot list deployments")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        registry.set_healthy(components::CLUSTER).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
    }

    #[test]
    fn test_component_health_from_failures() {
        assert_eq!(
            ComponentHealth::from_failures(0, 3, None).status,
            ComponentStatus::Healthy
        );

        let partial = ComponentHealth::from_failures(1, 3, Some("timeout"));
        assert_eq!(partial.status, ComponentStatus::Degraded);
        assert_eq!(partial.message.as_deref(), Some("1/3 calls failed: timeout"));

        assert_eq!(
            ComponentHealth::from_failures(2, 2, None).status,
            ComponentStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_readiness_requires_start() {
        let registry = HealthRegistry::new();
        registry.register(components::STORE).await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_names_unhealthy_components() {
        let registry = HealthRegistry::new();
        registry.register_all(components::ALL).await;
        registry.set_ready(true).await;
        registry.set_unhealthy(components::STORE, "Store closed").await;
        registry.set_unhealthy(components::ENGINE, "Loop stopped").await;
        registry.set_degraded(components::QUEUE, "lag timeout").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Unhealthy: engine, store"));
    }
}
