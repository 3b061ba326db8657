use kube::ResourceExt;

use crate::api::{constants::RELEASE_LABEL, v1::capacity_target::CapacityTarget};

const RELEASE_KIND: &str = "Release";

/// Name of the release owning a capacity target: the release label, or an
/// owner reference of kind Release when the label is absent.
pub fn resolve_release(target: &CapacityTarget) -> Option<String> {
    if let Some(name) = target.labels().get(RELEASE_LABEL.as_str()) {
        return Some(name.clone());
    }
    target
        .owner_references()
        .iter()
        .find(|owner| owner.kind == RELEASE_KIND)
        .map(|owner| owner.name.clone())
}
