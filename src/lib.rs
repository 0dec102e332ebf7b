// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod analyze;
pub mod buffer;
pub mod config;
pub mod event;
pub mod ingest;
pub mod pruner;
pub mod report;
pub mod scheduler;
pub mod signal;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{AggregateSnapshot, Aggregator};
pub use crate::buffer::EventBuffer;
pub use crate::config::AppConfig;
pub use crate::event::{parse_record, Author, Event, EventError};
pub use crate::ingest::{Ingested, JsonLinesSource, StreamListener, StreamSource};
pub use crate::pruner::WindowPruner;
pub use crate::report::{CycleOutcome, CycleReport, ReportSink};
pub use crate::scheduler::{ReportScheduler, SchedulerCfg};
pub use crate::signal::RateLimitSignal;
