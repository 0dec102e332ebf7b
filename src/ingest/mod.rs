// src/ingest/mod.rs
pub mod jsonl;
pub mod types;

use std::sync::Arc;

use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::buffer::EventBuffer;
use crate::config::DEFAULT_RATE_LIMIT_STATUS;
use crate::event::{parse_record, Event, EventError};
use crate::signal::RateLimitSignal;

pub use crate::ingest::jsonl::JsonLinesSource;
pub use crate::ingest::types::{Ingested, StreamSource};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Events appended to the window buffer.");
        describe_counter!(
            "ingest_skipped_total",
            "Records dropped at ingestion (no timestamp or retweet)."
        );
        describe_counter!("ingest_invalid_total", "Records that could not be decoded.");
        describe_counter!(
            "ingest_rate_limited_total",
            "Rate-limit status reports from the source."
        );
        describe_counter!("aggregate_cycles_total", "Completed reporting cycles.");
        describe_counter!(
            "aggregate_skipped_events_total",
            "Malformed events excluded from a cycle."
        );
        describe_counter!("window_pruned_total", "Events evicted from the window.");
        describe_gauge!("window_events", "Events held in the window buffer after pruning.");
    });
}

/// Callbacks for the stream collaborator: connect, data, error.
///
/// Cheap to clone; every clone appends into the same buffer and drives the same
/// rate-limit flag.
#[derive(Debug, Clone)]
pub struct StreamListener {
    buffer: Arc<EventBuffer>,
    rate_limit: RateLimitSignal,
    rate_limit_status: u16,
    closed: CancellationToken,
}

impl StreamListener {
    pub fn new(buffer: Arc<EventBuffer>, rate_limit: RateLimitSignal) -> Self {
        Self {
            buffer,
            rate_limit,
            rate_limit_status: DEFAULT_RATE_LIMIT_STATUS,
            closed: CancellationToken::new(),
        }
    }

    pub fn with_rate_limit_status(mut self, status: u16) -> Self {
        self.rate_limit_status = status;
        self
    }

    /// Stop accepting events once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.closed = token;
        self
    }

    /// Connected (or reconnected): throttling is over.
    pub fn on_connect(&self) {
        self.rate_limit.clear();
        tracing::info!(target: "ingest", "stream connected, starting report generation");
    }

    /// Raw record pushed by the stream.
    pub fn on_data(&self, raw: &str) -> Ingested {
        self.on_record(parse_record(raw))
    }

    /// Already-decoded record, as returned by [`parse_record`].
    pub fn on_record(&self, record: Result<Option<Event>, EventError>) -> Ingested {
        match record {
            Ok(Some(ev)) => self.on_event(ev),
            Ok(None) => {
                counter!("ingest_skipped_total").increment(1);
                Ingested::Skipped
            }
            Err(e) => {
                tracing::debug!(target: "ingest", error = %e, "undecodable record");
                counter!("ingest_invalid_total").increment(1);
                Ingested::Invalid(e)
            }
        }
    }

    pub fn on_event(&self, ev: Event) -> Ingested {
        if self.closed.is_cancelled() {
            return Ingested::Closed;
        }
        if ev.is_retweet {
            counter!("ingest_skipped_total").increment(1);
            return Ingested::Skipped;
        }
        self.buffer.append(ev);
        counter!("ingest_events_total").increment(1);
        Ingested::Appended
    }

    /// Non-success status from the stream. Returns `true` if it was the
    /// rate-limit code.
    pub fn on_error(&self, status: u16) -> bool {
        if status == self.rate_limit_status {
            self.rate_limit.set();
            counter!("ingest_rate_limited_total").increment(1);
            tracing::warn!(target: "ingest", status, "rate limit reached, retrying in some time");
            true
        } else {
            tracing::warn!(target: "ingest", status, "stream error status");
            false
        }
    }
}
