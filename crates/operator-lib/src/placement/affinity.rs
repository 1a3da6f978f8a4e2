//! Node affinity decisions
//!
//! A deployment is either steered toward a node with a preferred `In` term
//! or kept off it with a required `NotIn` term. The live pod template is
//! the only state: a decision reads it, returns no-op when the intent is
//! already expressed, and otherwise clears whatever affinity exists before
//! writing the new term.

use crate::cluster::{ClusterGateway, DeploymentRecord, RESTARTED_AT_ANNOTATION};
use crate::error::Result;
use crate::models::{AffinityIntent, AffinityMode, PlacementAction};
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{Affinity, NodeSelectorRequirement};
use serde_json::{json, Value};
use tracing::debug;

const OP_IN: &str = "In";
const OP_NOT_IN: &str = "NotIn";

fn lists_node(expr: &NodeSelectorRequirement, key: &str, operator: &str, node: &str) -> bool {
    expr.key == key
        && expr.operator == operator
        && expr
            .values
            .as_ref()
            .map(|values| values.iter().any(|v| v == node))
            .unwrap_or(false)
}

/// View over the affinity currently set on a deployment's pod template
#[derive(Debug, Clone, Copy)]
pub struct AffinityState<'a> {
    affinity: Option<&'a Affinity>,
}

impl<'a> AffinityState<'a> {
    pub fn new(affinity: Option<&'a Affinity>) -> Self {
        Self { affinity }
    }

    pub fn of(record: &'a DeploymentRecord) -> Self {
        Self::new(record.affinity.as_ref())
    }

    /// A required term keeps pods off `node` under `key`
    pub fn has_required_anti_affinity(&self, node: &str, key: &str) -> bool {
        self.affinity
            .and_then(|a| a.node_affinity.as_ref())
            .and_then(|na| na.required_during_scheduling_ignored_during_execution.as_ref())
            .map(|selector| {
                selector.node_selector_terms.iter().any(|term| {
                    term.match_expressions
                        .iter()
                        .flatten()
                        .any(|expr| lists_node(expr, key, OP_NOT_IN, node))
                })
            })
            .unwrap_or(false)
    }

    /// A preferred term steers pods toward `node` under `key`
    pub fn has_preferred_affinity(&self, node: &str, key: &str) -> bool {
        self.affinity
            .and_then(|a| a.node_affinity.as_ref())
            .and_then(|na| na.preferred_during_scheduling_ignored_during_execution.as_ref())
            .map(|terms| {
                terms.iter().any(|term| {
                    term.preference
                        .match_expressions
                        .iter()
                        .flatten()
                        .any(|expr| lists_node(expr, key, OP_IN, node))
                })
            })
            .unwrap_or(false)
    }

    /// No affinity of any kind is set
    pub fn is_empty(&self) -> bool {
        match self.affinity {
            None => true,
            Some(a) => {
                a.node_affinity.is_none() && a.pod_affinity.is_none() && a.pod_anti_affinity.is_none()
            }
        }
    }

    /// Whether the intent for `node` is already in place
    pub fn satisfies(&self, node: &str, mode: AffinityMode, key: &str) -> bool {
        match mode {
            AffinityMode::Avoid => self.has_required_anti_affinity(node, key),
            AffinityMode::Prefer => self.has_preferred_affinity(node, key),
        }
    }
}

/// Writes needed to bring a deployment in line with an intent
#[derive(Debug, Clone, PartialEq)]
pub enum AffinityPlan {
    NoOp,
    Apply {
        /// Remove the existing affinity before applying `patch`
        clear_first: bool,
        patch: Value,
    },
}

/// Decide what to write for `node`/`mode` given the live affinity
pub fn plan(
    state: &AffinityState<'_>,
    node: &str,
    mode: AffinityMode,
    key: &str,
    restarted_at: DateTime<Utc>,
) -> AffinityPlan {
    if state.satisfies(node, mode, key) {
        return AffinityPlan::NoOp;
    }

    let patch = match mode {
        AffinityMode::Avoid => avoid_patch(node, key, restarted_at),
        AffinityMode::Prefer => prefer_patch(node, key, restarted_at),
    };
    AffinityPlan::Apply {
        clear_first: !state.is_empty(),
        patch,
    }
}

fn template_patch(node_affinity: Value, restarted_at: DateTime<Utc>) -> Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        RESTARTED_AT_ANNOTATION: restarted_at.to_rfc3339_opts(SecondsFormat::Millis, true)
                    }
                },
                "spec": {
                    "affinity": {
                        "nodeAffinity": node_affinity
                    }
                }
            }
        }
    })
}

/// Required term keeping pods off `node`
pub fn avoid_patch(node: &str, key: &str, restarted_at: DateTime<Utc>) -> Value {
    template_patch(
        json!({
            "requiredDuringSchedulingIgnoredDuringExecution": {
                "nodeSelectorTerms": [{
                    "matchExpressions": [{
                        "key": key,
                        "operator": OP_NOT_IN,
                        "values": [node]
                    }]
                }]
            }
        }),
        restarted_at,
    )
}

/// Preferred term steering pods toward `node`; drops any required term
pub fn prefer_patch(node: &str, key: &str, restarted_at: DateTime<Utc>) -> Value {
    template_patch(
        json!({
            "preferredDuringSchedulingIgnoredDuringExecution": [{
                "weight": 1,
                "preference": {
                    "matchExpressions": [{
                        "key": key,
                        "operator": OP_IN,
                        "values": [node]
                    }]
                }
            }],
            "requiredDuringSchedulingIgnoredDuringExecution": null
        }),
        restarted_at,
    )
}

/// Patch removing every affinity from the pod template
pub fn clear_patch() -> Value {
    json!({ "spec": { "template": { "spec": { "affinity": null } } } })
}

/// Read the deployment and write whatever `intent` still needs
pub async fn apply_intent(
    gateway: &dyn ClusterGateway,
    intent: &AffinityIntent,
    key: &str,
    now: DateTime<Utc>,
) -> Result<PlacementAction> {
    let record = gateway
        .read_deployment(&intent.namespace, &intent.deployment)
        .await?;
    let state = AffinityState::of(&record);

    match plan(&state, &intent.target_node, intent.mode, key, now) {
        AffinityPlan::NoOp => {
            debug!(
                deployment = %intent.deployment,
                node = %intent.target_node,
                mode = %intent.mode,
                "Desired affinity already set"
            );
            Ok(PlacementAction::Unchanged)
        }
        AffinityPlan::Apply { clear_first, patch } => {
            if clear_first {
                gateway
                    .patch_deployment_affinity(&intent.namespace, &intent.deployment, &clear_patch())
                    .await?;
                debug!(deployment = %intent.deployment, "Cleared existing affinity");
            }
            gateway
                .patch_deployment_affinity(&intent.namespace, &intent.deployment, &patch)
                .await?;
            Ok(PlacementAction::Applied)
        }
    }
}
