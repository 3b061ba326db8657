use chrono::Utc;

use crate::api::v1::capacity_target::{
    CapacityTargetStatus, ClusterCapacityCondition, ClusterCapacityStatus, ClusterConditionType,
    ConditionStatus,
};

pub const WRONG_POD_COUNT: &str = "WrongPodCount";
pub const PODS_NOT_READY: &str = "PodsNotReady";
pub const UNKNOWN_CLUSTER: &str = "UnknownCluster";
pub const WORKLOAD_FETCH_FAILED: &str = "WorkloadFetchFailed";
pub const POD_LIST_FETCH_FAILED: &str = "PodListFetchFailed";
pub const WORKLOAD_PATCH_FAILED: &str = "WorkloadPatchFailed";
pub const INVALID_RELEASE_BUDGET: &str = "InvalidReleaseBudget";

/// Whether conditions carry transition timestamps.
///
/// `Discard` leaves every timestamp unset and strips observed ones before
/// statuses are compared, so the same observations always produce the same
/// status document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampPolicy {
    #[default]
    Keep,
    Discard,
}

impl TimestampPolicy {
    /// Builds a condition, keeping the previous transition time when the
    /// status of that condition type has not changed.
    pub fn condition(
        &self,
        previous: Option<&ClusterCapacityStatus>,
        type_: ClusterConditionType,
        status: ConditionStatus,
        reason: &str,
        message: String,
    ) -> ClusterCapacityCondition {
        let last_transition_time = match self {
            TimestampPolicy::Discard => None,
            TimestampPolicy::Keep => previous
                .and_then(|p| p.condition(type_))
                .filter(|c| c.status == status)
                .and_then(|c| c.last_transition_time)
                .or_else(|| Some(Utc::now())),
        };
        ClusterCapacityCondition {
            type_,
            status,
            last_transition_time,
            reason: reason.to_string(),
            message,
        }
    }

    pub fn normalize(&self, status: &mut CapacityTargetStatus) {
        if *self == TimestampPolicy::Keep {
            return;
        }
        for cluster in status.clusters.iter_mut() {
            for condition in cluster.conditions.iter_mut() {
                condition.last_transition_time = None;
            }
            for pod in cluster.sad_pods.iter_mut() {
                pod.condition.last_probe_time = None;
                pod.condition.last_transition_time = None;
            }
        }
    }
}
