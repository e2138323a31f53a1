//! Wall-clock timestamps for checkpoints and writes

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_NANOS: AtomicI64 = AtomicI64::new(0);

/// Current time in nanoseconds since the Unix epoch.
///
/// Values returned within one process are strictly increasing, even when the
/// system clock steps backwards or two calls land in the same clock tick.
pub fn now_nanos() -> i64 {
    let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut last = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last.saturating_add(1));
        match LAST_NANOS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_nanos_strictly_increasing() {
        let mut prev = now_nanos();
        for _ in 0..1000 {
            let next = now_nanos();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_now_nanos_tracks_wall_clock() {
        let wall = Utc::now().timestamp_nanos_opt().unwrap();
        assert!(now_nanos() >= wall);
    }
}
