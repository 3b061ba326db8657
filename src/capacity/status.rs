use kube::ResourceExt;
use tracing::{debug, info};

use super::{
    clients::CapacityTargetStore,
    conditions::TimestampPolicy,
    error::{is_conflict, Error, Result},
};
use crate::api::v1::capacity_target::{CapacityTarget, CapacityTargetStatus, ClusterCapacityStatus};

/// Builds the status document from per-cluster results given in declaration order.
pub fn assemble(clusters: impl IntoIterator<Item = ClusterCapacityStatus>) -> CapacityTargetStatus {
    CapacityTargetStatus {
        clusters: clusters.into_iter().collect(),
    }
}

/// Whether `computed` differs from what is stored on `target`, after normalization.
pub fn status_changed(
    target: &CapacityTarget,
    computed: &CapacityTargetStatus,
    timestamps: TimestampPolicy,
) -> bool {
    let mut stored = target.status.clone().unwrap_or_default();
    let mut computed = computed.clone();
    timestamps.normalize(&mut stored);
    timestamps.normalize(&mut computed);
    stored != computed
}

/// Writes `computed` as the status of `target` unless it is unchanged.
/// Returns whether an update was issued.
pub async fn write_status_if_changed(
    store: &dyn CapacityTargetStore,
    target: &CapacityTarget,
    computed: CapacityTargetStatus,
    timestamps: TimestampPolicy,
) -> Result<bool> {
    let key = format!(
        "{}/{}",
        target.namespace().unwrap_or_default(),
        target.name_any()
    );
    if !status_changed(target, &computed, timestamps) {
        debug!("Status of {} is unchanged", key);
        return Ok(false);
    }

    let mut updated = target.clone();
    updated.status = Some(computed);
    store.update_status(&updated).await.map_err(|source| {
        if is_conflict(&source) {
            Error::StatusWriteConflict { key: key.clone(), source }
        } else {
            Error::StatusWrite { key: key.clone(), source }
        }
    })?;
    info!("Updated status of {}", key);
    Ok(true)
}
