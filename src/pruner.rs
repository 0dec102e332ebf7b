// src/pruner.rs
use metrics::counter;

use crate::buffer::EventBuffer;

/// Evicts events that fell out of the trailing window. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowPruner;

impl WindowPruner {
    /// Prune everything older than `now_ms - window_ms`. Returns the number removed;
    /// a second call with the same `now_ms` removes nothing.
    pub fn run(&self, buffer: &EventBuffer, now_ms: i64, window_ms: u64) -> usize {
        let threshold = threshold_ms(now_ms, window_ms);
        let removed = buffer.prune_before(threshold);
        if removed > 0 {
            counter!("window_pruned_total").increment(removed as u64);
        }
        tracing::debug!(target: "scheduler", removed, threshold, "window pruned");
        removed
    }
}

/// Lower edge of the window ending at `now_ms`, clamped to `i64::MIN`.
pub fn threshold_ms(now_ms: i64, window_ms: u64) -> i64 {
    let edge = i128::from(now_ms) - i128::from(window_ms);
    i64::try_from(edge).unwrap_or(i64::MIN)
}
