//! In-memory collaborators for unit and scenario tests

use crate::carbon::CarbonIntensitySource;
use crate::cluster::{ClusterGateway, DeploymentRecord, PodRecord};
use crate::error::{OperatorError, Result};
use crate::models::{
    HourlyValue, NodeInfo, PlacementEvent, ScalingDecision, ScalingEvent, Window,
};
use crate::queue::{QueueLag, QueueTarget};
use crate::store::{DecisionStore, StoreError, StoreResult};
use crate::telemetry::{InstantSample, RangeSeries, Telemetry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Affinity;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn sample(labels: &[(&str, &str)], value: f64) -> InstantSample {
    InstantSample {
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        timestamp: 0.0,
        value,
    }
}

pub fn node(name: &str, labels: &[(&str, &str)]) -> NodeInfo {
    NodeInfo {
        name: name.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

pub fn deployment(
    namespace: &str,
    name: &str,
    match_labels: Option<&[(&str, &str)]>,
    affinity: Option<Affinity>,
) -> DeploymentRecord {
    DeploymentRecord {
        name: name.to_string(),
        namespace: namespace.to_string(),
        match_labels: match_labels.map(|labels| {
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }),
        replicas: Some(1),
        affinity,
    }
}

pub fn pod(name: &str, phase: &str) -> PodRecord {
    PodRecord {
        name: name.to_string(),
        namespace: String::new(),
        phase: Some(phase.to_string()),
        node_name: None,
    }
}

/// Prometheus stand-in.
///
/// Expressions registered with `with_query` answer with their samples; any
/// other instant query answers with the battery levels.
#[derive(Default)]
pub struct MockTelemetry {
    queries: HashMap<String, Vec<InstantSample>>,
    battery_instant: Vec<InstantSample>,
    battery_range: Vec<RangeSeries>,
    failing: bool,
}

impl MockTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Battery history of a node, one sample per minute
    pub fn with_battery(mut self, node: &str, levels: &[f64]) -> Self {
        let labels: HashMap<String, String> =
            HashMap::from([("node".to_string(), node.to_string())]);
        if let Some(last) = levels.last() {
            self.battery_instant.push(InstantSample {
                labels: labels.clone(),
                timestamp: 0.0,
                value: *last,
            });
        }
        self.battery_range.push(RangeSeries {
            labels,
            points: levels
                .iter()
                .enumerate()
                .map(|(i, level)| (i as f64 * 60.0, *level))
                .collect(),
        });
        self
    }

    /// Current level without any history
    pub fn with_instant_level(mut self, node: &str, level: f64) -> Self {
        self.battery_instant.push(sample(&[("node", node)], level));
        self
    }

    pub fn with_query(mut self, expr: &str, samples: Vec<InstantSample>) -> Self {
        self.queries.insert(expr.to_string(), samples);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl Telemetry for MockTelemetry {
    async fn query_instant(&self, expr: &str) -> Result<Vec<InstantSample>> {
        if self.failing {
            return Err(OperatorError::Telemetry("connection refused".to_string()));
        }
        Ok(self
            .queries
            .get(expr)
            .cloned()
            .unwrap_or_else(|| self.battery_instant.clone()))
    }

    async fn query_range(
        &self,
        _expr: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _step: Duration,
    ) -> Result<Vec<RangeSeries>> {
        if self.failing {
            return Err(OperatorError::Telemetry("connection refused".to_string()));
        }
        Ok(self.battery_range.clone())
    }
}

/// API server stand-in that applies affinity patches to its deployments
#[derive(Default)]
pub struct MockCluster {
    nodes: Vec<NodeInfo>,
    deployments: Mutex<Vec<DeploymentRecord>>,
    pods: Vec<(String, String, PodRecord)>,
    patches: Mutex<Vec<(String, String, Value)>>,
    replica_calls: Mutex<Vec<(String, String, i32)>>,
    label_patches: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    evictions: Mutex<Vec<(String, String)>>,
    fail_list_nodes: bool,
    fail_patch: HashSet<String>,
    fail_replicas: bool,
    fail_evict: HashSet<String>,
    patch_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: NodeInfo) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_deployment(self, deployment: DeploymentRecord) -> Self {
        self.deployments
            .lock()
            .unwrap()
            .push(deployment);
        self
    }

    /// A pod returned for `selector` in `namespace`
    pub fn with_pod(mut self, namespace: &str, selector: &str, pod: PodRecord) -> Self {
        self.pods
            .push((namespace.to_string(), selector.to_string(), pod));
        self
    }

    pub fn failing_node_list(mut self) -> Self {
        self.fail_list_nodes = true;
        self
    }

    /// Every patch of `deployment` fails
    pub fn failing_patch(mut self, deployment: &str) -> Self {
        self.fail_patch.insert(deployment.to_string());
        self
    }

    /// Eviction of `pod` is refused
    pub fn failing_eviction(mut self, pod: &str) -> Self {
        self.fail_evict.insert(pod.to_string());
        self
    }

    pub fn failing_replicas(mut self) -> Self {
        self.fail_replicas = true;
        self
    }

    /// Hold every affinity patch for `delay`
    pub fn with_patch_delay(mut self, delay: Duration) -> Self {
        self.patch_delay = Some(delay);
        self
    }

    pub fn patches(&self) -> Vec<(String, String, Value)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn replica_calls(&self) -> Vec<(String, String, i32)> {
        self.replica_calls.lock().unwrap().clone()
    }

    pub fn label_patches(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.label_patches.lock().unwrap().clone()
    }

    pub fn evictions(&self) -> Vec<(String, String)> {
        self.evictions.lock().unwrap().clone()
    }

    /// Highest number of affinity patches seen in flight at once
    pub fn max_concurrent_patches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn affinity_of(&self, namespace: &str, name: &str) -> Option<Affinity> {
        self.deployments
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.namespace == namespace && d.name == name)
            .and_then(|d| d.affinity.clone())
    }

    fn not_found(namespace: &str, name: &str) -> OperatorError {
        OperatorError::Cluster(format!(
            "deployments.apps \"{}\" not found in {}",
            name, namespace
        ))
    }
}

#[async_trait]
impl ClusterGateway for MockCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        if self.fail_list_nodes {
            return Err(OperatorError::Cluster("nodes is forbidden".to_string()));
        }
        Ok(self.nodes.clone())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<DeploymentRecord>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<PodRecord>> {
        Ok(self
            .pods
            .iter()
            .filter(|(ns, selector, _)| ns == namespace && selector == label_selector)
            .map(|(_, _, pod)| pod.clone())
            .collect())
    }

    async fn read_deployment(&self, namespace: &str, name: &str) -> Result<DeploymentRecord> {
        self.deployments
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.namespace == namespace && d.name == name)
            .cloned()
            .ok_or_else(|| Self::not_found(namespace, name))
    }

    async fn patch_node_labels(
        &self,
        node: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.label_patches
            .lock()
            .unwrap()
            .push((node.to_string(), labels.clone()));
        Ok(())
    }

    async fn patch_deployment_affinity(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<()> {
        if self.fail_patch.contains(name) {
            return Err(OperatorError::Cluster(format!(
                "admission webhook denied patch of {}",
                name
            )));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.patch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let affinity = &patch["spec"]["template"]["spec"]["affinity"];
        let affinity: Option<Affinity> = serde_json::from_value(affinity.clone())
            .map_err(|e| OperatorError::Cluster(e.to_string()))?;

        let mut deployments = self.deployments.lock().unwrap();
        let record = deployments
            .iter_mut()
            .find(|d| d.namespace == namespace && d.name == name)
            .ok_or_else(|| Self::not_found(namespace, name))?;
        record.affinity = affinity;

        self.patches
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), patch.clone()));
        Ok(())
    }

    async fn replace_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()> {
        if self.fail_replicas {
            return Err(OperatorError::Cluster("conflict on replace".to_string()));
        }
        self.replica_calls
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), replicas));
        Ok(())
    }

    async fn evict_pod(&self, namespace: &str, pod: &str) -> Result<()> {
        if self.fail_evict.contains(pod) {
            return Err(OperatorError::Cluster(format!(
                "Cannot evict pod {} as it would violate the pod's disruption budget",
                pod
            )));
        }
        self.evictions
            .lock()
            .unwrap()
            .push((namespace.to_string(), pod.to_string()));
        Ok(())
    }
}

/// Consumer lag stand-in; `None` makes every query fail
pub struct MockQueue {
    lag: Option<u64>,
    calls: AtomicUsize,
}

impl MockQueue {
    pub fn new(lag: u64) -> Self {
        Self {
            lag: Some(lag),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            lag: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueLag for MockQueue {
    async fn lag(&self, _target: &QueueTarget) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lag
            .ok_or_else(|| OperatorError::Queue("broker transport failure".to_string()))
    }
}

/// Carbon source counting fetches; `None` makes every fetch fail
pub struct MockCarbon {
    values: Option<Vec<f64>>,
    calls: AtomicUsize,
}

impl MockCarbon {
    pub fn new(values: &[f64]) -> Self {
        Self {
            values: Some(values.to_vec()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            values: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CarbonIntensitySource for MockCarbon {
    async fn hourly_intensity(&self) -> Result<Vec<HourlyValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let values = self
            .values
            .as_ref()
            .ok_or_else(|| OperatorError::CarbonFeed("API error (503)".to_string()))?;
        Ok(values
            .iter()
            .enumerate()
            .map(|(hour, value)| HourlyValue::new(hour as u32, *value))
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Store whose every read and write fails with an I/O error
#[derive(Default)]
pub struct FailingStore;

impl DecisionStore for FailingStore {
    fn get_windows(&self, _date: &str) -> StoreResult<Option<Vec<Window>>> {
        Err(StoreError::Read("disk I/O error".to_string()))
    }

    fn put_windows(&self, _date: &str, _windows: &[Window]) -> StoreResult<()> {
        Err(StoreError::Write("disk I/O error".to_string()))
    }

    fn append_event(&self, _decision: &ScalingDecision) -> StoreResult<u64> {
        Err(StoreError::Write("disk I/O error".to_string()))
    }

    fn recent_events(&self, _limit: usize) -> StoreResult<Vec<ScalingEvent>> {
        Err(StoreError::Read("disk I/O error".to_string()))
    }

    fn append_placement(&self, _event: &PlacementEvent) -> StoreResult<u64> {
        Err(StoreError::Write("disk I/O error".to_string()))
    }

    fn recent_placements(&self, _limit: usize) -> StoreResult<Vec<PlacementEvent>> {
        Err(StoreError::Read("disk I/O error".to_string()))
    }
}
