use std::time::{Duration, SystemTime};

/// Frames older than this are not worth sending to the inference service:
/// the broadcaster has most likely stalled or disconnected.
pub const DEFAULT_MAX_FRAME_AGE: Duration = Duration::from_secs(10);

/// Returns true when `now - timestamp` exceeds `threshold`.
///
/// A timestamp ahead of `now` (wall clock stepped back) counts as age zero.
pub fn is_stale(timestamp: SystemTime, now: SystemTime, threshold: Duration) -> bool {
    frame_age(timestamp, now) > threshold
}

pub fn frame_age(timestamp: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(timestamp).unwrap_or_default()
}
