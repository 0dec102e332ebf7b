// src/signal.rs
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Process-wide "upstream is throttling us" flag.
///
/// Written only by the stream connection callbacks (set on the rate-limit status,
/// cleared on a successful connect); read by the report scheduler.
#[derive(Debug, Clone, Default)]
pub struct RateLimitSignal {
    flag: Arc<AtomicBool>,
}

impl RateLimitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
