// src/scheduler.rs
//! Periodic reporting: every tick runs one prune → aggregate → emit cycle.
//!
//! Policy is drop-if-busy. Cycles run inline in the timer task, so two cycles can
//! never overlap; ticks that come due while a cycle is still running are skipped
//! (`MissedTickBehavior::Skip`) rather than queued.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::analyze::Aggregator;
use crate::buffer::EventBuffer;
use crate::pruner::WindowPruner;
use crate::report::{CycleOutcome, CycleReport, ReportSink};
use crate::signal::RateLimitSignal;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub window_ms: u64,
}

pub struct ReportScheduler {
    cfg: SchedulerCfg,
    buffer: Arc<EventBuffer>,
    pruner: WindowPruner,
    aggregator: Aggregator,
    rate_limit: RateLimitSignal,
    sink: Arc<dyn ReportSink>,
    clock: Clock,
}

impl ReportScheduler {
    pub fn new(
        cfg: SchedulerCfg,
        buffer: Arc<EventBuffer>,
        aggregator: Aggregator,
        rate_limit: RateLimitSignal,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            cfg,
            buffer,
            pruner: WindowPruner,
            aggregator,
            rate_limit,
            sink,
            clock: Arc::new(|| Utc::now().timestamp_millis()),
        }
    }

    /// Replace the wall clock (milliseconds since epoch) used for cycle times.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// One full cycle at `now_ms`.
    ///
    /// Aggregation runs on a blocking worker; if it panics, the cycle fails with an
    /// error and the scheduler carries on with the next tick.
    pub async fn run_cycle(&self, now_ms: i64) -> Result<CycleReport> {
        let pruned = self.pruner.run(&self.buffer, now_ms, self.cfg.window_ms);
        let events = self.buffer.snapshot();
        gauge!("window_events").set(events.len() as f64);

        let aggregator = self.aggregator.clone();
        let window_ms = self.cfg.window_ms;
        let snap = tokio::task::spawn_blocking(move || aggregator.compute(&events, now_ms, window_ms))
            .await
            .context("aggregation worker failed")?;

        tracing::info!(
            target: "scheduler",
            pruned,
            in_window = snap.in_window,
            considered = snap.considered(),
            skipped = snap.skipped.len(),
            "cycle computed"
        );

        let outcome = if !snap.is_empty() {
            CycleOutcome::Stats(snap)
        } else if self.rate_limit.is_set() {
            CycleOutcome::RateLimited
        } else {
            CycleOutcome::NoEvents
        };

        let report = CycleReport {
            generated_at: Utc
                .timestamp_millis_opt(now_ms)
                .single()
                .unwrap_or_else(Utc::now),
            outcome,
        };
        self.sink.emit(&report).await.context("emitting report")?;
        counter!("aggregate_cycles_total").increment(1);
        Ok(report)
    }

    /// Drive cycles until `cancel` fires. The first cycle runs one interval after
    /// start. A cycle in progress when cancellation arrives is allowed to finish.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.cfg.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let now_ms = (self.clock)();
                if let Err(e) = self.run_cycle(now_ms).await {
                    tracing::error!(target: "scheduler", "report cycle failed: {e:#}");
                }
            }
            tracing::info!(target: "scheduler", "exiting report timer");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::report::MemorySink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler(window_ms: u64) -> (ReportScheduler, Arc<EventBuffer>, RateLimitSignal, Arc<MemorySink>) {
        let buf = Arc::new(EventBuffer::new());
        let sig = RateLimitSignal::new();
        let sink = Arc::new(MemorySink::new());
        let s = ReportScheduler::new(
            SchedulerCfg {
                interval: Duration::from_millis(20),
                window_ms,
            },
            buf.clone(),
            Aggregator::default(),
            sig.clone(),
            sink.clone(),
        );
        (s, buf, sig, sink)
    }

    #[tokio::test]
    async fn cycle_prunes_then_reports() {
        let (s, buf, _, sink) = scheduler(1_000);
        buf.append(Event::new(100, "1", "old", "stale"));
        buf.append(Event::new(9_500, "2", "new", "fresh news"));

        let report = s.run_cycle(10_000).await.unwrap();
        assert_eq!(buf.len(), 1);
        let stats = report.stats().expect("stats");
        assert_eq!(stats.considered(), 1);
        assert_eq!(stats.words.get("fresh"), Some(1));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn empty_window_reports_no_events_or_deferral() {
        let (s, _, sig, _) = scheduler(1_000);
        let r = s.run_cycle(10_000).await.unwrap();
        assert!(matches!(r.outcome, CycleOutcome::NoEvents));

        sig.set();
        let r = s.run_cycle(10_000).await.unwrap();
        assert!(matches!(r.outcome, CycleOutcome::RateLimited));
    }

    #[tokio::test]
    async fn only_malformed_events_count_as_empty() {
        let (s, buf, sig, _) = scheduler(1_000);
        let mut ev = Event::new(9_999, "1", "a", "x");
        ev.user = None;
        buf.append(ev);
        sig.set();
        let r = s.run_cycle(10_000).await.unwrap();
        assert!(matches!(r.outcome, CycleOutcome::RateLimited));
    }

    #[tokio::test]
    async fn spawned_loop_ticks_and_stops_on_cancel() {
        let (s, _, _, sink) = scheduler(1_000);
        let cancel = CancellationToken::new();
        let handle = s.with_clock(|| 50_000).spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(130)).await;
        cancel.cancel();
        handle.await.unwrap();
        let n = sink.len();
        assert!(n >= 2, "expected several cycles, got {n}");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sink.len(), n);
    }

    struct SlowSink {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
        done: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReportSink for SlowSink {
        async fn emit(&self, _report: &CycleReport) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(70)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_cycles_never_overlap() {
        let sink = Arc::new(SlowSink {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        });
        let s = ReportScheduler::new(
            SchedulerCfg {
                interval: Duration::from_millis(10),
                window_ms: 1_000,
            },
            Arc::new(EventBuffer::new()),
            Aggregator::default(),
            RateLimitSignal::new(),
            sink.clone(),
        );
        let cancel = CancellationToken::new();
        let handle = s.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.max_seen.load(Ordering::SeqCst), 1);
        // ~25 ticks elapsed but each cycle takes 70ms; skipped ticks are not queued
        let done = sink.done.load(Ordering::SeqCst);
        assert!((2..=5).contains(&done), "unexpected cycle count {done}");
    }
}
