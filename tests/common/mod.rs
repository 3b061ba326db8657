pub mod fakes;

#[cfg(test)]
pub mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use k8s_openapi::{
        api::{
            apps::v1::{Deployment, DeploymentSpec, DeploymentStatus},
            core::v1::{Pod, PodCondition, PodStatus as KubePodStatus},
        },
        apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
    };
    use kube::{api::ObjectMeta, ResourceExt};

    use capacity_controllers::{
        api::{
            constants::{RELEASE_LABEL, RELEASE_REPLICAS_ANNOTATION},
            v1::{
                capacity_target::{
                    CapacityTarget, CapacityTargetSpec, ClusterCapacityCondition,
                    ClusterCapacityStatus, ClusterCapacityTarget, ClusterConditionType,
                    ConditionStatus, PodStatus,
                },
                release::{Release, ReleaseSpec},
            },
        },
        capacity::{conditions::TimestampPolicy, SyncHandler},
    };

    use super::fakes::{FakeCluster, FakeClusterStore, FakeManagement, RecordingRecorder};

    pub const NAMESPACE: &str = "reviewsapi";
    pub const CAPACITY_TARGET: &str = "capacity-v0.0.1";

    /// Management cluster objects, target clusters and the recorder a sync handler runs against.
    pub struct Fixture {
        pub management: Arc<FakeManagement>,
        pub clusters: FakeClusterStore,
        pub recorder: Arc<RecordingRecorder>,
        pub timestamps: TimestampPolicy,
    }

    impl Fixture {
        pub fn new() -> Fixture {
            Fixture {
                management: Arc::new(FakeManagement::default()),
                clusters: FakeClusterStore::default(),
                recorder: Arc::new(RecordingRecorder::default()),
                timestamps: TimestampPolicy::Discard,
            }
        }

        pub fn with_cluster(&mut self, name: &str, cluster: FakeCluster) -> Arc<FakeCluster> {
            self.clusters.insert(name, cluster)
        }

        pub fn handler(&self) -> SyncHandler {
            SyncHandler {
                capacity_targets: self.management.clone(),
                releases: self.management.clone(),
                clusters: Arc::new(self.clusters.clone()),
                recorder: self.recorder.clone(),
                timestamps: self.timestamps,
            }
        }

        /// Runs the sync handler for the default capacity target and returns its retry flag.
        pub async fn sync(&self) -> bool {
            self.handler().sync(NAMESPACE, CAPACITY_TARGET).await
        }
    }

    pub fn new_release(name: &str, namespace: &str, replicas: &str) -> Release {
        let mut release = Release::new(
            name,
            ReleaseSpec::default(),
        );
        release.metadata = ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{name}")),
            annotations: Some(BTreeMap::from([(
                RELEASE_REPLICAS_ANNOTATION.to_string(),
                replicas.to_string(),
            )])),
            ..Default::default()
        };
        release
    }

    pub fn new_capacity_target_for_release(
        release: &Release,
        name: &str,
        namespace: &str,
        clusters: &[(&str, i32)],
    ) -> CapacityTarget {
        let mut target = CapacityTarget::new(
            name,
            CapacityTargetSpec {
                clusters: clusters
                    .iter()
                    .map(|(name, percent)| ClusterCapacityTarget {
                        name: name.to_string(),
                        percent: *percent,
                    })
                    .collect(),
            },
        );
        target.metadata = ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("1".to_string()),
            labels: Some(BTreeMap::from([(
                RELEASE_LABEL.to_string(),
                release.name_any(),
            )])),
            owner_references: Some(vec![OwnerReference {
                api_version: "shipper.io/v1".to_string(),
                kind: "Release".to_string(),
                name: release.name_any(),
                uid: release.uid().unwrap_or_default(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        target
    }

    pub fn new_deployment_for_release(
        release: &Release,
        name: &str,
        namespace: &str,
        replicas: i32,
        available_replicas: i32,
    ) -> Deployment {
        let labels = BTreeMap::from([(RELEASE_LABEL.to_string(), release.name_any())]);
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(labels),
                    ..Default::default()
                },
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                available_replicas: Some(available_replicas),
                ..Default::default()
            }),
        }
    }

    fn pod_for_deployment(
        deployment: &Deployment,
        name: &str,
        phase: &str,
        condition: PodCondition,
    ) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: deployment.namespace(),
                labels: Some(BTreeMap::from([(
                    RELEASE_LABEL.to_string(),
                    deployment.labels()[RELEASE_LABEL.as_str()].clone(),
                )])),
                ..Default::default()
            },
            spec: None,
            status: Some(KubePodStatus {
                phase: Some(phase.to_string()),
                conditions: Some(vec![condition]),
                ..Default::default()
            }),
        }
    }

    pub fn create_happy_pod_for_deployment(deployment: &Deployment) -> Pod {
        pod_for_deployment(
            deployment,
            "nginx-1a93Y2-happy",
            "Running",
            PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            },
        )
    }

    pub fn create_sad_pod_for_deployment(deployment: &Deployment) -> Pod {
        pod_for_deployment(
            deployment,
            "nginx-1a93Y2-sad",
            "Failed",
            PodCondition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                reason: Some("ExpectedFail".to_string()),
                message: Some("This failure is meant to happen!".to_string()),
                ..Default::default()
            },
        )
    }

    pub fn sad_pod_status(pod: &Pod) -> PodStatus {
        PodStatus {
            name: pod.name_any(),
            condition: pod.status.as_ref().unwrap().conditions.as_ref().unwrap()[0].clone(),
        }
    }

    pub fn condition(
        type_: ClusterConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> ClusterCapacityCondition {
        ClusterCapacityCondition {
            type_,
            status,
            last_transition_time: None,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }

    pub fn operational() -> ClusterCapacityCondition {
        condition(
            ClusterConditionType::Operational,
            ConditionStatus::True,
            "",
            "",
        )
    }

    pub fn ready(status: ConditionStatus, reason: &str, message: &str) -> ClusterCapacityCondition {
        condition(ClusterConditionType::Ready, status, reason, message)
    }

    pub fn cluster_status(
        name: &str,
        available_replicas: i32,
        achieved_percent: i32,
        conditions: Vec<ClusterCapacityCondition>,
        sad_pods: Vec<PodStatus>,
    ) -> ClusterCapacityStatus {
        ClusterCapacityStatus {
            name: name.to_string(),
            available_replicas,
            achieved_percent,
            conditions,
            sad_pods,
        }
    }
}
