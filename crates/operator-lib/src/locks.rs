//! Per-deployment write serialization
//!
//! Placement and scaling passes may overlap when a pass outlives its tick
//! or both modes touch the same deployment. Every write to a deployment
//! happens while holding that deployment's lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async locks keyed by `(namespace, deployment)`
#[derive(Clone, Default)]
pub struct DeploymentLocks {
    locks: Arc<DashMap<(String, String), Arc<Mutex<()>>>>,
}

impl DeploymentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a deployment
    pub async fn acquire(&self, namespace: &str, deployment: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((namespace.to_string(), deployment.to_string()))
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
