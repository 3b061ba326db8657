use std::sync::Arc;

use futures::future::join_all;
use garde::Validate;
use kube::ResourceExt;
use tracing::{error, info, instrument, warn};

use super::{
    aggregate::{cluster_status, mark_not_operational, pod_selector, unobserved_cluster_status},
    budget::release_budget,
    clients::{CapacityTargetStore, ClusterClientStore, EventRecorder, ReleaseStore},
    conditions::{
        TimestampPolicy, INVALID_RELEASE_BUDGET, POD_LIST_FETCH_FAILED, UNKNOWN_CLUSTER,
        WORKLOAD_FETCH_FAILED, WORKLOAD_PATCH_FAILED,
    },
    error::{is_not_found, Error, Result},
    release::resolve_release,
    replicas::replicas_for_percent,
    status::{assemble, write_status_if_changed},
    workload::{find_release_deployment, reconcile_replicas},
};
use crate::api::v1::capacity_target::{CapacityTarget, ClusterCapacityStatus, ClusterCapacityTarget};

/// What one reconciliation of a capacity target did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The caller should re-enqueue the key.
    pub retry: bool,
    /// Number of deployments patched.
    pub patches: usize,
    pub status_written: bool,
}

struct ClusterOutcome {
    status: ClusterCapacityStatus,
    patched: bool,
    errors: Vec<Error>,
}

impl ClusterOutcome {
    fn failed(status: ClusterCapacityStatus, error: Error) -> Self {
        Self {
            status,
            patched: false,
            errors: vec![error],
        }
    }
}

/// Reconciles capacity targets against their target clusters.
#[derive(Clone)]
pub struct SyncHandler {
    pub capacity_targets: Arc<dyn CapacityTargetStore>,
    pub releases: Arc<dyn ReleaseStore>,
    pub clusters: Arc<dyn ClusterClientStore>,
    pub recorder: Arc<dyn EventRecorder>,
    pub timestamps: TimestampPolicy,
}

impl SyncHandler {
    /// Reconciles one capacity target and returns whether it should be retried.
    pub async fn sync(&self, namespace: &str, name: &str) -> bool {
        match self.try_sync(namespace, name).await {
            Ok(outcome) => outcome.retry,
            Err(e @ Error::InvalidSpec { .. }) => {
                error!("{}", e);
                false
            }
            Err(e) => {
                warn!("{}", e);
                true
            }
        }
    }

    /// Like [`SyncHandler::sync`], but hands back the errors that prevented a
    /// status from being written at all.
    #[instrument(skip(self))]
    pub async fn try_sync(&self, namespace: &str, name: &str) -> Result<SyncOutcome> {
        let key = format!("{namespace}/{name}");
        let target = match self.capacity_targets.get(namespace, name).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                info!("Capacity target {} is gone", key);
                return Ok(SyncOutcome::default());
            }
            Err(source) if is_not_found(&source) => return Ok(SyncOutcome::default()),
            Err(source) => return Err(Error::CapacityTargetFetch { key, source }),
        };

        target.spec.validate().map_err(|report| Error::InvalidSpec {
            key: key.clone(),
            report: report.to_string(),
        })?;

        let Some(release_name) = resolve_release(&target) else {
            warn!("Capacity target {} has no owning release", key);
            return Ok(SyncOutcome::default());
        };
        let release = match self.releases.get_release(namespace, &release_name).await {
            Ok(Some(release)) => release,
            Ok(None) => {
                info!("Release {}/{} is gone", namespace, release_name);
                return Ok(SyncOutcome::default());
            }
            Err(source) if is_not_found(&source) => return Ok(SyncOutcome::default()),
            Err(source) => {
                return Err(Error::ReleaseFetch {
                    key: format!("{namespace}/{release_name}"),
                    source,
                })
            }
        };

        let outcomes = match release_budget(&release) {
            Ok(budget) => {
                join_all(target.spec.clusters.iter().map(|cluster| {
                    self.sync_cluster(&target, namespace, &release_name, budget, cluster)
                }))
                .await
            }
            Err(e) => {
                let release_key = format!("{namespace}/{release_name}");
                self.without_budget(&target, &release_key, e.to_string())
            }
        };

        let mut outcome = SyncOutcome::default();
        let mut statuses = Vec::with_capacity(outcomes.len());
        for cluster in outcomes {
            if cluster.patched {
                outcome.patches += 1;
            }
            for e in &cluster.errors {
                warn!("{}", e);
            }
            outcome.retry |= !cluster.errors.is_empty();
            statuses.push(cluster.status);
        }

        outcome.status_written = write_status_if_changed(
            self.capacity_targets.as_ref(),
            &target,
            assemble(statuses),
            self.timestamps,
        )
        .await?;
        Ok(outcome)
    }

    /// Every declared cluster is reported as not operational when the budget is unusable.
    fn without_budget(
        &self,
        target: &CapacityTarget,
        release: &str,
        message: String,
    ) -> Vec<ClusterOutcome> {
        target
            .spec
            .clusters
            .iter()
            .map(|cluster| {
                let status = unobserved_cluster_status(
                    &cluster.name,
                    INVALID_RELEASE_BUDGET,
                    message.clone(),
                    previous(target, &cluster.name),
                    self.timestamps,
                );
                let e = Error::InvalidBudget {
                    release: release.to_string(),
                    reason: format!("cluster {} left unscaled: {}", cluster.name, message),
                };
                ClusterOutcome::failed(status, e)
            })
            .collect()
    }

    #[instrument(skip(self, target, spec), fields(cluster = %spec.name))]
    async fn sync_cluster(
        &self,
        target: &CapacityTarget,
        namespace: &str,
        release: &str,
        budget: i32,
        spec: &ClusterCapacityTarget,
    ) -> ClusterOutcome {
        let cluster = spec.name.as_str();
        let prior = previous(target, cluster);
        let unobserved = |reason: &str, err: &Error| {
            unobserved_cluster_status(cluster, reason, err.to_string(), prior, self.timestamps)
        };

        let clients = match self.clusters.get_clients(cluster) {
            Ok(clients) => clients,
            Err(e) => return ClusterOutcome::failed(unobserved(UNKNOWN_CLUSTER, &e), e),
        };

        let deployment =
            match find_release_deployment(clients.workloads.as_ref(), cluster, namespace, release)
                .await
            {
                Ok(deployment) => deployment,
                Err(e) => return ClusterOutcome::failed(unobserved(WORKLOAD_FETCH_FAILED, &e), e),
            };

        let desired = replicas_for_percent(budget, spec.percent);
        let patch =
            reconcile_replicas(clients.workloads.as_ref(), cluster, &deployment, desired).await;
        let patched = matches!(patch, Ok(true));
        if patched {
            self.recorder
                .record(
                    target,
                    "CapacityChanged",
                    format!(
                        "Scaled {} on cluster {} to {} replicas ({}% of {})",
                        deployment.name_any(),
                        cluster,
                        desired,
                        spec.percent,
                        budget
                    ),
                )
                .await;
        }

        let pods = match pod_selector(cluster, &deployment) {
            Ok(selector) => clients
                .pods
                .list_pods(namespace, &selector)
                .await
                .map_err(|source| Error::PodListFetch {
                    cluster: cluster.to_string(),
                    deployment: deployment.name_any(),
                    source,
                }),
            Err(e) => Err(e),
        };
        let pods = match pods {
            Ok(pods) => pods,
            Err(e) => {
                let mut outcome = ClusterOutcome::failed(unobserved(POD_LIST_FETCH_FAILED, &e), e);
                outcome.patched = patched;
                if let Err(patch_err) = patch {
                    outcome.errors.push(patch_err);
                }
                return outcome;
            }
        };

        let mut status =
            cluster_status(cluster, budget, &deployment, &pods, prior, self.timestamps);
        let mut errors = Vec::new();
        if let Err(e) = patch {
            mark_not_operational(
                &mut status,
                WORKLOAD_PATCH_FAILED,
                e.to_string(),
                prior,
                self.timestamps,
            );
            errors.push(e);
        }

        ClusterOutcome {
            status,
            patched,
            errors,
        }
    }
}

fn previous<'a>(target: &'a CapacityTarget, cluster: &str) -> Option<&'a ClusterCapacityStatus> {
    target.status.as_ref().and_then(|s| s.cluster(cluster))
}
