use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{Pod, PodCondition},
};
use kube::{core::Selector, ResourceExt};

use super::{
    conditions::{TimestampPolicy, PODS_NOT_READY, WRONG_POD_COUNT},
    error::{Error, Result},
    replicas::achieved_percent,
};
use crate::api::v1::capacity_target::{
    ClusterCapacityStatus, ClusterConditionType, ConditionStatus, PodStatus,
};

const POD_READY: &str = "Ready";
const POD_FAILED: &str = "Failed";

/// Derives a cluster's status from its deployment and the pods it selects,
/// both as observed before any replica patch of this cycle took effect.
pub fn cluster_status(
    cluster: &str,
    budget: i32,
    deployment: &Deployment,
    pods: &[Pod],
    previous: Option<&ClusterCapacityStatus>,
    timestamps: TimestampPolicy,
) -> ClusterCapacityStatus {
    let available_replicas = deployment
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);
    let declared = declared_replicas(deployment);
    let actual = pods.len();

    // a negative declared count never matches, it must not wrap
    let (ready, reason, message, sad_pods) = if actual as i64 != i64::from(declared) {
        (
            ConditionStatus::False,
            WRONG_POD_COUNT,
            format!("expected {declared} replicas but have {actual}"),
            Vec::new(),
        )
    } else {
        let mut sad_pods = pods.iter().filter_map(sad_pod).collect::<Vec<_>>();
        sad_pods.sort_by(|a, b| a.name.cmp(&b.name));
        if sad_pods.is_empty() {
            (ConditionStatus::True, "", String::new(), sad_pods)
        } else {
            let message = format!("there are {} sad pods", sad_pods.len());
            (ConditionStatus::False, PODS_NOT_READY, message, sad_pods)
        }
    };

    ClusterCapacityStatus {
        name: cluster.to_string(),
        available_replicas,
        achieved_percent: achieved_percent(available_replicas, budget),
        conditions: vec![
            timestamps.condition(
                previous,
                ClusterConditionType::Operational,
                ConditionStatus::True,
                "",
                String::new(),
            ),
            timestamps.condition(previous, ClusterConditionType::Ready, ready, reason, message),
        ],
        sad_pods,
    }
}

/// Status for a cluster that could not be observed: not operational, readiness unknown.
pub fn unobserved_cluster_status(
    cluster: &str,
    reason: &str,
    message: String,
    previous: Option<&ClusterCapacityStatus>,
    timestamps: TimestampPolicy,
) -> ClusterCapacityStatus {
    ClusterCapacityStatus {
        name: cluster.to_string(),
        available_replicas: 0,
        achieved_percent: 0,
        conditions: vec![
            timestamps.condition(
                previous,
                ClusterConditionType::Operational,
                ConditionStatus::False,
                reason,
                message,
            ),
            timestamps.condition(
                previous,
                ClusterConditionType::Ready,
                ConditionStatus::Unknown,
                "",
                String::new(),
            ),
        ],
        sad_pods: Vec::new(),
    }
}

/// Marks an otherwise observed cluster as not operational, e.g. after a failed patch.
pub fn mark_not_operational(
    status: &mut ClusterCapacityStatus,
    reason: &str,
    message: String,
    previous: Option<&ClusterCapacityStatus>,
    timestamps: TimestampPolicy,
) {
    let condition = timestamps.condition(
        previous,
        ClusterConditionType::Operational,
        ConditionStatus::False,
        reason,
        message,
    );
    match status
        .conditions
        .iter_mut()
        .find(|c| c.type_ == ClusterConditionType::Operational)
    {
        Some(existing) => *existing = condition,
        None => status.conditions.insert(0, condition),
    }
}

pub fn declared_replicas(deployment: &Deployment) -> i32 {
    // the API server defaults a missing replica count to 1
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1)
}

/// The deployment's full pod selector, match expressions included.
pub fn pod_selector(cluster: &str, deployment: &Deployment) -> Result<Selector> {
    let unusable = |reason: String| Error::PodSelector {
        cluster: cluster.to_string(),
        deployment: deployment.name_any(),
        reason,
    };
    let label_selector = deployment
        .spec
        .as_ref()
        .map(|s| s.selector.clone())
        .ok_or_else(|| unusable("deployment has no spec".to_string()))?;
    let selector =
        Selector::try_from(label_selector).map_err(|e| unusable(e.to_string()))?;
    // an empty selector would count every pod in the namespace
    if selector.selects_all() {
        return Err(unusable("selector is empty".to_string()));
    }
    Ok(selector)
}

fn sad_pod(pod: &Pod) -> Option<PodStatus> {
    let status = pod.status.as_ref();
    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == POD_READY));
    let failed = status.and_then(|s| s.phase.as_deref()) == Some(POD_FAILED);

    match ready {
        Some(cond) if cond.status == "True" && !failed => None,
        Some(cond) => Some(PodStatus {
            name: pod.name_any(),
            condition: cond.clone(),
        }),
        None => Some(PodStatus {
            name: pod.name_any(),
            condition: PodCondition {
                type_: POD_READY.to_string(),
                status: "Unknown".to_string(),
                reason: Some("ReadinessNotReported".to_string()),
                ..Default::default()
            },
        }),
    }
}
