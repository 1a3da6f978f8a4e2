//! kube-rs implementation of the cluster gateway

use super::{ClusterGateway, DeploymentRecord, PodRecord};
use crate::error::Result;
use crate::models::NodeInfo;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, EvictParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Gateway backed by a kube client
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster environment or the local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn deployment_record(deployment: &Deployment) -> DeploymentRecord {
    let spec = deployment.spec.as_ref();
    DeploymentRecord {
        name: deployment.name_any(),
        namespace: deployment.namespace().unwrap_or_default(),
        match_labels: spec.and_then(|s| s.selector.match_labels.clone()),
        replicas: spec.and_then(|s| s.replicas),
        affinity: spec
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.affinity.clone()),
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default()).await?;
        Ok(list
            .items
            .iter()
            .map(|node| NodeInfo {
                name: node.name_any(),
                labels: node.labels().clone(),
            })
            .collect())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<DeploymentRecord>> {
        let list = self
            .deployments(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items.iter().map(deployment_record).collect())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<PodRecord>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list
            .items
            .iter()
            .map(|pod| PodRecord {
                name: pod.name_any(),
                namespace: namespace.to_string(),
                phase: pod.status.as_ref().and_then(|s| s.phase.clone()),
                node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            })
            .collect())
    }

    async fn read_deployment(&self, namespace: &str, name: &str) -> Result<DeploymentRecord> {
        let deployment = self.deployments(namespace).get(name).await?;
        Ok(deployment_record(&deployment))
    }

    async fn patch_node_labels(
        &self,
        node: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<()> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let patch = json!({ "metadata": { "labels": labels } });
        nodes
            .patch(node, &PatchParams::default(), &Patch::Strategic(&patch))
            .await?;
        info!(node = %node, ?labels, "Patched node labels");
        Ok(())
    }

    async fn patch_deployment_affinity(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        self.deployments(namespace)
            .patch(name, &PatchParams::default(), &Patch::Strategic(patch))
            .await?;
        debug!(deployment = %name, namespace = %namespace, "Patched deployment affinity");
        Ok(())
    }

    async fn replace_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()> {
        let api = self.deployments(namespace);
        let mut deployment = api.get(name).await?;
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
        api.replace(name, &PostParams::default(), &deployment).await?;
        info!(deployment = %name, namespace = %namespace, replicas, "Replaced deployment replicas");
        Ok(())
    }

    async fn evict_pod(&self, namespace: &str, pod: &str) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.evict(pod, &EvictParams::default()).await?;
        info!(pod = %pod, namespace = %namespace, "Evicted pod");
        Ok(())
    }
}
