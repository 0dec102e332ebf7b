// src/report.rs
//! Report model and emission.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::analyze::AggregateSnapshot;

const BANNER: &str = "##########################################";

/// Result of one cycle.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Stats(AggregateSnapshot),
    /// Nothing in the window and the source is not throttling.
    NoEvents,
    /// Nothing in the window while the source reports rate limiting.
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub generated_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn stats(&self) -> Option<&AggregateSnapshot> {
        match &self.outcome {
            CycleOutcome::Stats(s) => Some(s),
            _ => None,
        }
    }

    /// Plain-text report: user activity, top `top_k` words, domain frequency.
    pub fn render(&self, top_k: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{BANNER} Report Start {BANNER}");
        let _ = writeln!(out, "Generated at {}", self.generated_at.to_rfc3339());

        match &self.outcome {
            CycleOutcome::NoEvents => {
                let _ = writeln!(out, "No events found");
            }
            CycleOutcome::RateLimited => {
                let _ = writeln!(out, "Rate limit reached, deferring report generation.");
            }
            CycleOutcome::Stats(s) => {
                let _ = writeln!(out, "Events in window: {}", s.considered());
                if !s.skipped.is_empty() {
                    let _ = writeln!(out, "Skipped malformed events: {}", s.skipped.len());
                }
                render_users(&mut out, s);
                render_words(&mut out, s, top_k);
                render_links(&mut out, s);
            }
        }

        let _ = writeln!(out, "{BANNER} Report End {BANNER}");
        out
    }
}

fn render_users(out: &mut String, s: &AggregateSnapshot) {
    let _ = writeln!(out, "************** User Report **************");
    if s.users.is_empty() {
        let _ = writeln!(out, "Zero users have posted with the given keyword");
        return;
    }
    for (author, count) in s.user_ranking() {
        let _ = writeln!(out, "{} has posted {} posts", author.name, count);
    }
}

fn render_words(out: &mut String, s: &AggregateSnapshot, top_k: usize) {
    let _ = writeln!(out, "************** Content Report **************");
    if s.words.is_empty() {
        let _ = writeln!(out, "Zero words in the window");
        return;
    }
    let _ = writeln!(out, "Unique words: {}", s.words.len());
    let top = s.top_words(top_k);
    let _ = writeln!(out, "The {} most frequently used words:", top.len());
    for (word, count) in top {
        let _ = writeln!(out, "{word}    :   {count}");
    }
}

fn render_links(out: &mut String, s: &AggregateSnapshot) {
    let _ = writeln!(out, "************** Links Report **************");
    let _ = writeln!(out, "Total number of links: {}", s.total_urls);
    if s.domains.is_empty() {
        let _ = writeln!(out, "Zero domains in the window");
        return;
    }
    let _ = writeln!(out, "Unique domains by decreasing frequency:");
    for (domain, count) in s.domain_ranking() {
        let _ = writeln!(out, "{domain}    :   {count}");
    }
}

/// Where finished reports go.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn emit(&self, report: &CycleReport) -> Result<()>;
}

/// Prints rendered reports to stdout.
#[derive(Debug, Clone)]
pub struct StdoutSink {
    pub top_k: usize,
}

#[async_trait::async_trait]
impl ReportSink for StdoutSink {
    async fn emit(&self, report: &CycleReport) -> Result<()> {
        print!("{}", report.render(self.top_k));
        Ok(())
    }
}

// --- Test helper ---
#[derive(Debug, Default)]
pub struct MemorySink {
    pub reports: parking_lot::Mutex<Vec<CycleReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl ReportSink for MemorySink {
    async fn emit(&self, report: &CycleReport) -> Result<()> {
        self.reports.lock().push(report.clone());
        Ok(())
    }
}
