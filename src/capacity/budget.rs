use kube::ResourceExt;

use super::error::{Error, Result};
use crate::api::{constants::RELEASE_REPLICAS_ANNOTATION, v1::release::Release};

/// Reads the total replica budget of a release from its annotation.
pub fn release_budget(release: &Release) -> Result<i32> {
    let invalid = |reason: String| Error::InvalidBudget {
        release: format!(
            "{}/{}",
            release.namespace().unwrap_or_default(),
            release.name_any()
        ),
        reason,
    };

    let raw = release
        .replicas_annotation()
        .ok_or_else(|| invalid(format!("missing {}", RELEASE_REPLICAS_ANNOTATION.as_str())))?;
    let budget: i32 = raw
        .trim()
        .parse()
        .map_err(|e| invalid(format!("{raw:?} is not an integer: {e}")))?;
    if budget < 0 {
        return Err(invalid(format!("{budget} is negative")));
    }
    Ok(budget)
}
