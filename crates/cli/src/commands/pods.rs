//! Pod eviction

use anyhow::Result;
use operator_lib::cluster::{evict_pods, KubeGateway};

use super::nodes::client;
use crate::output::{print_error, print_success};

/// Evict `pods` in `namespace`, reporting each outcome
pub async fn evict(namespace: &str, pods: &[String], kubeconfig: Option<&str>) -> Result<()> {
    let gateway = KubeGateway::new(client(kubeconfig).await?);

    let results = evict_pods(&gateway, namespace, pods).await;

    let failed = summarize(namespace, &results);
    if failed > 0 {
        anyhow::bail!("{} of {} evictions failed", failed, results.len());
    }
    Ok(())
}

fn summarize(namespace: &str, results: &[(String, operator_lib::Result<()>)]) -> usize {
    let mut failed = 0;
    for (pod, result) in results {
        match result {
            Ok(()) => print_success(&format!("Evicted {}/{}", namespace, pod)),
            Err(e) => {
                failed += 1;
                print_error(&format!("{}/{}: {}", namespace, pod, e));
            }
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_lib::OperatorError;

    #[test]
    fn test_summarize_counts_failures() {
        colored::control::set_override(false);
        let results = vec![
            ("api-1".to_string(), Ok(())),
            (
                "api-2".to_string(),
                Err(OperatorError::Cluster("disruption budget".to_string())),
            ),
        ];
        assert_eq!(summarize("testing", &results), 1);
    }
}
