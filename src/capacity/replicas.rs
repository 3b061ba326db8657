/// Number of replicas a cluster must run to hold `percent` of `total`.
///
/// Rounds up so a cluster is never provisioned below its declared share.
pub fn replicas_for_percent(total: i32, percent: i32) -> i32 {
    let scaled = i64::from(total) * i64::from(percent);
    // both factors are non-negative and percent <= 100, so the result fits
    ((scaled + 99) / 100) as i32
}

/// Share of `total` that `available` replicas represent, rounded down.
pub fn achieved_percent(available: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    (i64::from(available) * 100 / i64::from(total)) as i32
}
