use std::fmt::Debug;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::constants::RELEASE_REPLICAS_ANNOTATION;

/// A versioned deployable unit. The total replica budget lives in the
/// `shipper.io/release-replicas` annotation rather than in `ReleaseSpec`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "shipper.io",
    version = "v1",
    kind = "Release",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {}

impl Release {
    /// Raw value of the replica budget annotation, if set.
    pub fn replicas_annotation(&self) -> Option<&str> {
        self.annotations()
            .get(RELEASE_REPLICAS_ANNOTATION.as_str())
            .map(String::as_str)
    }
}
