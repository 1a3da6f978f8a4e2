//! Kubernetes access
//!
//! `ClusterGateway` is everything the controllers need from the API server;
//! `KubeGateway` implements it with kube-rs. Discovery helpers build the
//! per-pass views (solar nodes, active deployments) on top of it.

mod discovery;
mod gateway;

pub use self::discovery::{active_deployments, evict_pods, label_nodes, selector_query, solar_nodes};
pub use self::gateway::KubeGateway;

use crate::error::Result;
use crate::models::NodeInfo;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Affinity;
use std::collections::BTreeMap;

/// Annotation stamped on the pod template to trigger a rollout
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Pod phase counted as active
pub const RUNNING_PHASE: &str = "Running";

/// The parts of a deployment the operator reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentRecord {
    pub name: String,
    pub namespace: String,
    /// `spec.selector.matchLabels`
    pub match_labels: Option<BTreeMap<String, String>>,
    pub replicas: Option<i32>,
    /// `spec.template.spec.affinity`
    pub affinity: Option<Affinity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub phase: Option<String>,
    pub node_name: Option<String>,
}

impl PodRecord {
    pub fn is_running(&self) -> bool {
        self.phase.as_deref() == Some(RUNNING_PHASE)
    }
}

/// Cluster reads and writes used by the control loops
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<DeploymentRecord>>;

    /// Pods in `namespace` matching a `k=v,k2=v2` label selector
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<PodRecord>>;

    async fn read_deployment(&self, namespace: &str, name: &str) -> Result<DeploymentRecord>;

    /// Strategic-merge the given labels into a node
    async fn patch_node_labels(&self, node: &str, labels: &BTreeMap<String, String>)
        -> Result<()>;

    /// Strategic-merge patch of a deployment carrying affinity changes
    async fn patch_deployment_affinity(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()>;

    /// Read the deployment, set `spec.replicas`, replace it
    async fn replace_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()>;

    /// Evict a pod through the policy/v1 eviction subresource
    async fn evict_pod(&self, namespace: &str, pod: &str) -> Result<()>;
}
