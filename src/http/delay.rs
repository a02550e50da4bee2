//! Response delay with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay for a delayed route: `base_ms` plus up to `jitter * base_ms` extra.
pub fn calculate_delay(base_ms: u64, jitter: f64) -> Duration {
    if base_ms == 0 {
        return Duration::from_millis(0);
    }

    let jitter_range = (base_ms as f64 * jitter.max(0.0)) as u64;
    let extra = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(base_ms.saturating_add(extra))
}

/// Delay for a route given its `delayed` flag.
pub fn route_delay(delayed: bool, base_ms: u64, jitter: f64) -> Duration {
    if delayed {
        calculate_delay(base_ms, jitter)
    } else {
        Duration::ZERO
    }
}
