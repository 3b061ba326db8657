use std::{collections::HashSet, fmt::Debug};

use chrono::{DateTime, Utc};
use garde::Validate;
use k8s_openapi::api::core::v1::PodCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declares what share of a release's replica budget should run on each
/// target cluster, and reports what each cluster actually achieved.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Validate, PartialEq)]
#[kube(
    group = "shipper.io",
    version = "v1",
    kind = "CapacityTarget",
    status = "CapacityTargetStatus",
    shortname = "ct",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CapacityTargetSpec {
    #[garde(dive, custom(unique_cluster_names))]
    pub clusters: Vec<ClusterCapacityTarget>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCapacityTarget {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(range(min = 0, max = 100))]
    pub percent: i32,
}

fn unique_cluster_names(clusters: &Vec<ClusterCapacityTarget>, _ctx: &()) -> garde::Result {
    let mut seen = HashSet::new();
    for cluster in clusters {
        if !seen.insert(cluster.name.as_str()) {
            return Err(garde::Error::new(format!(
                "cluster {} is declared more than once",
                cluster.name
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapacityTargetStatus {
    /// One entry per declared cluster, in declaration order.
    #[serde(default)]
    pub clusters: Vec<ClusterCapacityStatus>,
}

impl CapacityTargetStatus {
    pub fn cluster(&self, name: &str) -> Option<&ClusterCapacityStatus> {
        self.clusters.iter().find(|c| c.name == name)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCapacityStatus {
    pub name: String,
    pub available_replicas: i32,
    pub achieved_percent: i32,
    /// Always one Operational and one Ready condition.
    #[serde(default)]
    pub conditions: Vec<ClusterCapacityCondition>,
    #[serde(default)]
    pub sad_pods: Vec<PodStatus>,
}

impl ClusterCapacityStatus {
    pub fn condition(&self, type_: ClusterConditionType) -> Option<&ClusterCapacityCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCapacityCondition {
    #[serde(rename = "type")]
    pub type_: ClusterConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Hash)]
pub enum ClusterConditionType {
    /// The cluster could be reached and its workload observed and written.
    Operational,
    /// The cluster runs the expected number of pods, all of them ready.
    Ready,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Summary of a pod that is not ready.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    pub name: String,
    pub condition: PodCondition,
}
