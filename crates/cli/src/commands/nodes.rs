//! Node labelling

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use operator_lib::cluster::{label_nodes, KubeGateway};
use std::collections::BTreeMap;

use crate::output::{print_error, print_success, print_warning};

/// `node -> labels` mapping
pub type LabelMapping = BTreeMap<String, BTreeMap<String, String>>;

/// Parse `NODE=KEY=VALUE` assignments
pub fn parse_assignments(assignments: &[String]) -> Result<LabelMapping> {
    let mut mapping = LabelMapping::new();
    for assignment in assignments {
        let mut parts = assignment.splitn(3, '=');
        let (Some(node), Some(key), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
            anyhow::bail!("expected NODE=KEY=VALUE, got {}", assignment);
        };
        if node.is_empty() || key.is_empty() {
            anyhow::bail!("node and label key must not be empty in {}", assignment);
        }
        mapping
            .entry(node.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }
    Ok(mapping)
}

/// Kubernetes client from the given or default kubeconfig
pub(crate) async fn client(kubeconfig: Option<&str>) -> Result<kube::Client> {
    let path = crate::config::kubeconfig_path(kubeconfig)?;
    if !path.exists() {
        // fall back to in-cluster credentials
        return kube::Client::try_default()
            .await
            .context("Failed to create Kubernetes client");
    }

    let kubeconfig = Kubeconfig::read_from(&path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("Invalid kubeconfig")?;
    kube::Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Apply labels to existing nodes
pub async fn label(assignments: &[String], kubeconfig: Option<&str>) -> Result<()> {
    let mapping = parse_assignments(assignments)?;
    let gateway = KubeGateway::new(client(kubeconfig).await?);

    let results = label_nodes(&gateway, &mapping).await?;

    let mut failed = 0;
    for (node, result) in &results {
        match result {
            Ok(()) => print_success(&format!("Labelled {}", node)),
            Err(e) => {
                failed += 1;
                print_error(&format!("{}: {}", node, e));
            }
        }
    }

    for node in mapping.keys() {
        if !results.iter().any(|(n, _)| n == node) {
            print_warning(&format!("Node {} not found", node));
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} nodes failed", failed, results.len());
    }
    Ok(())
}
