use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::{debug, info};

use super::{
    aggregate::declared_replicas,
    clients::WorkloadClient,
    error::{Error, Result},
};
use crate::api::constants::RELEASE_LABEL;

/// Finds the single deployment belonging to `release` in `namespace`.
pub async fn find_release_deployment(
    workloads: &dyn WorkloadClient,
    cluster: &str,
    namespace: &str,
    release: &str,
) -> Result<Deployment> {
    let fetch_error = |reason: String| Error::WorkloadFetch {
        cluster: cluster.to_string(),
        release: format!("{namespace}/{release}"),
        reason,
    };
    let selector = format!("{}={}", RELEASE_LABEL.as_str(), release);
    let mut deployments = workloads
        .list_deployments(namespace, &selector)
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    match deployments.len() {
        1 => Ok(deployments.remove(0)),
        0 => Err(fetch_error(format!("no deployment matches {selector}"))),
        n => Err(fetch_error(format!(
            "expected exactly one deployment matching {selector} but found {n}"
        ))),
    }
}

/// Drives the deployment's declared replica count to `target`.
///
/// Returns whether a patch was issued; nothing is written when the count
/// already matches.
pub async fn reconcile_replicas(
    workloads: &dyn WorkloadClient,
    cluster: &str,
    deployment: &Deployment,
    target: i32,
) -> Result<bool> {
    let declared = declared_replicas(deployment);
    let name = deployment.name_any();
    if declared == target {
        debug!("Deployment {} on {} already has {} replicas", name, cluster, target);
        return Ok(false);
    }

    let namespace = deployment.namespace().unwrap_or("default".to_string());
    info!(
        "Scaling deployment {}/{} on {} from {} to {} replicas",
        namespace, name, cluster, declared, target
    );
    workloads
        .patch_replicas(&namespace, &name, target)
        .await
        .map_err(|source| Error::WorkloadWrite {
            cluster: cluster.to_string(),
            deployment: format!("{namespace}/{name}"),
            source,
        })?;
    Ok(true)
}
