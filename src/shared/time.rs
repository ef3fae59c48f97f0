use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Wall-clock time elapsed since `start_ms`. A start in the future counts as zero.
pub fn elapsed_since_millis(start_ms: i64) -> Duration {
    let delta = now_millis().saturating_sub(start_ms);
    Duration::from_millis(delta.max(0) as u64)
}
