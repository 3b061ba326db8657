use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("release {release} has an invalid replica budget annotation: {reason}")]
    InvalidBudget { release: String, reason: String },

    #[error("no client registered for cluster {cluster}")]
    UnknownCluster { cluster: String },

    #[error("failed to fetch deployment for release {release} on cluster {cluster}: {reason}")]
    WorkloadFetch {
        cluster: String,
        release: String,
        reason: String,
    },

    #[error("failed to list pods for deployment {deployment} on cluster {cluster}: {source}")]
    PodListFetch {
        cluster: String,
        deployment: String,
        #[source]
        source: kube::Error,
    },

    #[error("deployment {deployment} on cluster {cluster} has an unusable pod selector: {reason}")]
    PodSelector {
        cluster: String,
        deployment: String,
        reason: String,
    },

    #[error("failed to patch deployment {deployment} on cluster {cluster}: {source}")]
    WorkloadWrite {
        cluster: String,
        deployment: String,
        #[source]
        source: kube::Error,
    },

    #[error("capacity target {key} was modified concurrently")]
    StatusWriteConflict {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to update status of capacity target {key}: {source}")]
    StatusWrite {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to fetch capacity target {key}: {source}")]
    CapacityTargetFetch {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to fetch release {key}: {source}")]
    ReleaseFetch {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("capacity target {key} has an invalid spec: {report}")]
    InvalidSpec { key: String, report: String },
}

impl Error {
    /// Short label used for the failure metric.
    pub fn metric_label(&self) -> String {
        match self {
            Error::InvalidBudget { .. } => "invalid_budget",
            Error::UnknownCluster { .. } => "unknown_cluster",
            Error::WorkloadFetch { .. } => "workload_fetch",
            Error::PodListFetch { .. } => "pod_list_fetch",
            Error::PodSelector { .. } => "pod_selector",
            Error::WorkloadWrite { .. } => "workload_write",
            Error::StatusWriteConflict { .. } => "status_write_conflict",
            Error::StatusWrite { .. } => "status_write",
            Error::CapacityTargetFetch { .. } => "capacity_target_fetch",
            Error::ReleaseFetch { .. } => "release_fetch",
            Error::InvalidSpec { .. } => "invalid_spec",
        }
        .to_string()
    }
}

pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

pub(crate) fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}
