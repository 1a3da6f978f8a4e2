//! Per-pass views of the cluster

use super::ClusterGateway;
use crate::error::Result;
use crate::models::{DeploymentInfo, NodeInfo};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Names of nodes carrying `key=value`, in listing order
pub fn solar_nodes(nodes: &[NodeInfo], key: &str, value: &str) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| n.labels.get(key).map(String::as_str) == Some(value))
        .map(|n| n.name.clone())
        .collect()
}

/// Label selector string for a `matchLabels` map
pub fn selector_query(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Deployments with a `matchLabels` selector and at least one running pod.
///
/// Failing to list deployments in a namespace fails the whole call; failing
/// to list the pods of one deployment only skips that deployment.
pub async fn active_deployments(
    gateway: &dyn ClusterGateway,
    namespaces: &[String],
) -> Result<Vec<DeploymentInfo>> {
    let mut active = Vec::new();

    for namespace in namespaces {
        for deployment in gateway.list_deployments(namespace).await? {
            let Some(labels) = deployment.match_labels.as_ref().filter(|l| !l.is_empty()) else {
                continue;
            };

            let pods = match gateway.list_pods(namespace, &selector_query(labels)).await {
                Ok(pods) => pods,
                Err(e) => {
                    warn!(
                        deployment = %deployment.name,
                        namespace = %namespace,
                        error = %e,
                        "Failed to list pods, skipping deployment"
                    );
                    continue;
                }
            };

            let pod_count = pods.iter().filter(|p| p.is_running()).count();
            if pod_count > 0 {
                active.push(DeploymentInfo {
                    namespace: namespace.clone(),
                    deployment_name: deployment.name.clone(),
                    pod_count,
                });
            }
        }
    }

    debug!(count = active.len(), "Discovered active deployments");
    Ok(active)
}

/// Apply a `node -> labels` mapping to the nodes that exist.
///
/// Returns one result per patched node; nodes in the mapping that are not
/// in the cluster are ignored.
pub async fn label_nodes(
    gateway: &dyn ClusterGateway,
    mapping: &BTreeMap<String, BTreeMap<String, String>>,
) -> Result<Vec<(String, Result<()>)>> {
    let nodes = gateway.list_nodes().await?;
    let mut results = Vec::new();

    for node in nodes {
        let Some(labels) = mapping.get(&node.name).filter(|l| !l.is_empty()) else {
            continue;
        };
        let outcome = gateway.patch_node_labels(&node.name, labels).await;
        if let Err(e) = &outcome {
            warn!(node = %node.name, error = %e, "Failed to patch node labels");
        }
        results.push((node.name, outcome));
    }

    Ok(results)
}

/// Evict pods so they reschedule under their current affinity
///
/// Each pod is evicted independently; a refused eviction (e.g. blocked by a
/// PodDisruptionBudget) does not stop the rest.
pub async fn evict_pods(
    gateway: &dyn ClusterGateway,
    namespace: &str,
    pods: &[String],
) -> Vec<(String, Result<()>)> {
    let mut results = Vec::with_capacity(pods.len());
    for pod in pods {
        let outcome = gateway.evict_pod(namespace, pod).await;
        match &outcome {
            Ok(()) => debug!(namespace, pod = %pod, "Evicted pod"),
            Err(e) => warn!(namespace, pod = %pod, error = %e, "Failed to evict pod"),
        }
        results.push((pod.clone(), outcome));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperatorError;
    use crate::testing::{deployment, node, pod, MockCluster};

    #[test]
    fn test_solar_nodes_filter_by_label() {
        let nodes = vec![
            node("solar-1", &[("power", "solar")]),
            node("grid-1", &[("power", "grid")]),
            node("bare", &[]),
            node("solar-2", &[("power", "solar")]),
        ];
        assert_eq!(solar_nodes(&nodes, "power", "solar"), vec!["solar-1", "solar-2"]);
    }

    #[test]
    fn test_selector_query_is_sorted() {
        let labels = BTreeMap::from([
            ("tier".to_string(), "batch".to_string()),
            ("app".to_string(), "runner".to_string()),
        ]);
        assert_eq!(selector_query(&labels), "app=runner,tier=batch");
    }

    #[tokio::test]
    async fn test_active_deployments_need_running_pods() {
        let cluster = MockCluster::new()
            .with_deployment(deployment("testing", "api", Some(&[("app", "api")]), None))
            .with_deployment(deployment("testing", "idle", Some(&[("app", "idle")]), None))
            .with_deployment(deployment("testing", "headless", None, None))
            .with_pod("testing", "app=api", pod("api-1", "Running"))
            .with_pod("testing", "app=api", pod("api-2", "Pending"))
            .with_pod("testing", "app=idle", pod("idle-1", "Succeeded"));

        let active = active_deployments(&cluster, &["testing".to_string()])
            .await
            .unwrap();

        assert_eq!(
            active,
            vec![DeploymentInfo {
                namespace: "testing".to_string(),
                deployment_name: "api".to_string(),
                pod_count: 1,
            }]
        );
    }

    #[tokio::test]
    async fn test_label_nodes_patches_known_nodes_only() {
        let cluster = MockCluster::new()
            .with_node(node("solar-1", &[]))
            .with_node(node("grid-1", &[]));

        let mapping = BTreeMap::from([
            (
                "solar-1".to_string(),
                BTreeMap::from([("power".to_string(), "solar".to_string())]),
            ),
            (
                "ghost".to_string(),
                BTreeMap::from([("power".to_string(), "solar".to_string())]),
            ),
        ]);

        let results = label_nodes(&cluster, &mapping).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "solar-1");
        assert!(results[0].1.is_ok());
        assert_eq!(cluster.label_patches().len(), 1);
    }

    #[tokio::test]
    async fn test_evict_pods_continues_past_refusals() {
        let cluster = MockCluster::new().failing_eviction("api-2");
        let pods = vec!["api-1".to_string(), "api-2".to_string(), "api-3".to_string()];

        let results = evict_pods(&cluster, "testing", &pods).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(OperatorError::Cluster(_))));
        assert!(results[2].1.is_ok());
        assert_eq!(
            cluster.evictions(),
            vec![
                ("testing".to_string(), "api-1".to_string()),
                ("testing".to_string(), "api-3".to_string()),
            ]
        );
    }
}
