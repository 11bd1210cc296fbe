//! Monotonic microsecond clock used to timestamp samples at ingestion.

use once_cell::sync::Lazy;
use std::time::Instant;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Microseconds elapsed since the first call in this process.
///
/// Never goes backwards. Cheap enough for the ingestion path (no locks after
/// the first call).
pub fn now_micros() -> u64 {
    EPOCH.elapsed().as_micros() as u64
}
