use std::fmt::Display;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref SHIPPER_GROUP: String = "shipper.io".to_string();
    /// Label carried by capacity targets, deployments and pods naming the release they belong to.
    pub static ref RELEASE_LABEL: String = format!("{}/release", SHIPPER_GROUP.as_str());
    /// Annotation on a release holding its total replica budget.
    pub static ref RELEASE_REPLICAS_ANNOTATION: String =
        format!("{}/release-replicas", SHIPPER_GROUP.as_str());
}

impl Display for SHIPPER_GROUP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
