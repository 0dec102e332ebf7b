// src/analyze/mod.rs
//! Per-cycle aggregation: turns a snapshot of the window into user, word and domain
//! statistics.
//!
//! Every cycle builds a fresh [`AggregateSnapshot`]; nothing is carried over between
//! cycles. One event is processed at a time and validated before it touches any
//! counter, so a malformed event is excluded as a whole and never half-counted.

pub mod counter;
pub mod domain;
pub mod stopwords;
pub mod tokenizer;

use std::sync::Arc;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::event::{Author, Event, EventError};
use crate::pruner::threshold_ms;

pub use crate::analyze::counter::OrderedCounter;
pub use crate::analyze::domain::extract_domain;
pub use crate::analyze::stopwords::StopWords;
pub use crate::analyze::tokenizer::{Tokenizer, WordTokenizer};

/// Number of words in the content report unless configured otherwise.
pub const DEFAULT_TOP_WORDS: usize = 10;

/// Possessive fragment some tokenizers emit as a separate token.
const POSSESSIVE: &str = "'s";

static RE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("mention regex"));

/// An event excluded from a cycle because it could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEvent {
    /// Short anonymized id (hash of the event id or body), safe to log.
    pub anon_id: String,
    pub error: EventError,
}

/// Statistics for one cycle. Owned by that cycle and discarded after reporting.
#[derive(Debug, Clone, Default)]
pub struct AggregateSnapshot {
    pub users: OrderedCounter<Author>,
    pub words: OrderedCounter<String>,
    pub domains: OrderedCounter<String>,
    pub total_urls: u64,
    /// Non-retweet events inside the window, including those later skipped.
    pub in_window: usize,
    pub skipped: Vec<SkippedEvent>,
}

impl AggregateSnapshot {
    /// Events that actually contributed to the statistics.
    pub fn considered(&self) -> usize {
        self.in_window - self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.considered() == 0
    }

    /// Users by descending post count, then display name, then id.
    pub fn user_ranking(&self) -> Vec<(&Author, u64)> {
        let mut v: Vec<(&Author, u64)> = self.users.iter().collect();
        v.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.0.name.cmp(&b.0.name))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        v
    }

    /// Top `k` words; fewer if fewer distinct words were seen.
    pub fn top_words(&self, k: usize) -> Vec<(&str, u64)> {
        self.words
            .top(k)
            .into_iter()
            .map(|(w, n)| (w.as_str(), n))
            .collect()
    }

    /// All domains by descending reference count, ties in first-seen order.
    pub fn domain_ranking(&self) -> Vec<(&str, u64)> {
        self.domains
            .ranked()
            .into_iter()
            .map(|(d, n)| (d.as_str(), n))
            .collect()
    }
}

/// What one event contributes; built completely before anything is merged.
struct Contribution<'a> {
    author: &'a Author,
    urls: &'a [String],
    words: Vec<String>,
}

/// Computes [`AggregateSnapshot`]s. Cheap to clone; safe to move to a worker thread.
#[derive(Clone)]
pub struct Aggregator {
    tokenizer: Arc<dyn Tokenizer>,
    stop_words: Arc<StopWords>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("stop_words", &self.stop_words.len())
            .finish_non_exhaustive()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Arc::new(WordTokenizer), Arc::new(StopWords::english()))
    }
}

impl Aggregator {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, stop_words: Arc<StopWords>) -> Self {
        Self {
            tokenizer,
            stop_words,
        }
    }

    /// Aggregate the events with `now_ms - window_ms <= timestamp <= now_ms`,
    /// retweets excluded.
    pub fn compute(&self, events: &[Arc<Event>], now_ms: i64, window_ms: u64) -> AggregateSnapshot {
        let lower = threshold_ms(now_ms, window_ms);
        let mut snap = AggregateSnapshot::default();

        for ev in events {
            if ev.is_retweet || ev.timestamp_ms < lower || ev.timestamp_ms > now_ms {
                continue;
            }
            snap.in_window += 1;

            match self.contribution(ev) {
                Ok(c) => merge(&mut snap, c),
                Err(error) => {
                    let anon_id = anon_id(ev);
                    tracing::warn!(target: "aggregate", %anon_id, %error, "skipping event");
                    counter!("aggregate_skipped_events_total").increment(1);
                    snap.skipped.push(SkippedEvent { anon_id, error });
                }
            }
        }

        tracing::debug!(
            target: "aggregate",
            in_window = snap.in_window,
            skipped = snap.skipped.len(),
            users = snap.users.len(),
            words = snap.words.len(),
            domains = snap.domains.len(),
            "cycle aggregated"
        );
        snap
    }

    fn contribution<'a>(&self, ev: &'a Event) -> Result<Contribution<'a>, EventError> {
        let author = ev.author()?;
        let text = ev.effective_text()?;

        let stripped = RE_MENTION.replace_all(text, "");
        let words = self
            .tokenizer
            .tokenize(&stripped.to_lowercase())
            .into_iter()
            .filter(|w| self.keeps(w))
            .collect();

        Ok(Contribution {
            author,
            urls: ev.effective_urls(),
            words,
        })
    }

    fn keeps(&self, word: &str) -> bool {
        word != POSSESSIVE && word.chars().count() > 1 && !self.stop_words.contains(word)
    }
}

fn merge(snap: &mut AggregateSnapshot, c: Contribution<'_>) {
    snap.users.increment(c.author.clone());

    for url in c.urls {
        snap.total_urls += 1;
        if let Some(domain) = extract_domain(url) {
            snap.domains.increment(domain.to_string());
        }
    }

    for w in c.words {
        snap.words.increment(w);
    }
}

/// Short, non-reversible identifier for logging an event without its content.
pub(crate) fn anon_id(ev: &Event) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    match (&ev.id, &ev.text) {
        (Some(id), _) => hasher.update(id.as_bytes()),
        (None, Some(text)) => hasher.update(text.as_bytes()),
        (None, None) => hasher.update(ev.timestamp_ms.to_le_bytes()),
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_000_000;
    const WINDOW: u64 = 300_000;

    fn agg() -> Aggregator {
        Aggregator::default()
    }

    fn arc(evs: Vec<Event>) -> Vec<Arc<Event>> {
        evs.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn filters_stop_words_possessive_and_short_tokens() {
        let evs = arc(vec![Event::new(
            NOW,
            "1",
            "ada",
            "The crab's shell is a I x great shell @ferris",
        )]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        let words: Vec<&str> = snap.top_words(10).iter().map(|(w, _)| *w).collect();
        assert_eq!(words, vec!["shell", "crab", "great"]);
        assert_eq!(snap.words.get("shell"), Some(2));
        assert_eq!(snap.words.get("ferris"), None);
        assert_eq!(snap.words.get("'s"), None);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let lower = NOW - WINDOW as i64;
        let evs = arc(vec![
            Event::new(lower - 1, "1", "a", "old"),
            Event::new(lower, "2", "b", "edge"),
            Event::new(NOW, "3", "c", "now"),
            Event::new(NOW + 1, "4", "d", "future"),
        ]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        assert_eq!(snap.in_window, 2);
        let names: Vec<&str> = snap.user_ranking().iter().map(|(a, _)| a.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn retweets_never_count() {
        let evs = arc(vec![
            Event::new(NOW, "1", "a", "rust rust")
                .with_urls(["https://x.example/"])
                .retweet(),
        ]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        assert!(snap.is_empty());
        assert!(snap.words.is_empty());
        assert_eq!(snap.total_urls, 0);
    }

    #[test]
    fn nameless_author_is_not_counted_as_a_user() {
        let evs = arc(vec![
            Event::new(NOW, "7", "", "crabs rule"),
            Event::new(NOW, "8", "ferris", "crabs"),
        ]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        assert_eq!(snap.users.len(), 1);
        assert_eq!(snap.skipped[0].error, EventError::IncompleteAuthor("name"));
        assert_eq!(snap.words.get("crabs"), Some(1));
    }

    #[test]
    fn malformed_event_is_skipped_whole() {
        let mut broken = Event::new(NOW, "1", "a", "tokio tokio")
            .with_urls(["https://tokio.rs/"]);
        broken.user = None;
        let mut no_text = Event::new(NOW, "2", "b", "");
        no_text.text = None;
        let evs = arc(vec![broken, no_text, Event::new(NOW, "3", "c", "serde")]);

        let snap = agg().compute(&evs, NOW, WINDOW);
        assert_eq!(snap.in_window, 3);
        assert_eq!(snap.considered(), 1);
        assert_eq!(snap.skipped.len(), 2);
        assert_eq!(snap.skipped[0].error, EventError::MissingAuthor);
        assert_eq!(snap.skipped[1].error, EventError::MissingText);
        assert_eq!(snap.total_urls, 0);
        assert_eq!(snap.words.get("tokio"), None);
        assert_eq!(snap.words.get("serde"), Some(1));
    }

    #[test]
    fn urls_and_domains_prefer_extended_form() {
        let evs = arc(vec![
            Event::new(NOW, "1", "a", "short")
                .with_urls(["https://primary.example/"])
                .with_extended(
                    "long body",
                    vec![
                        "https://example.com/path?x=1".into(),
                        "https://example.com/other".into(),
                        "not-a-url".into(),
                    ],
                ),
        ]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        assert_eq!(snap.total_urls, 3);
        assert_eq!(snap.domain_ranking(), vec![("example.com", 2)]);
        assert_eq!(snap.words.get("short"), None);
        assert_eq!(snap.words.get("body"), Some(1));
    }

    #[test]
    fn ranking_breaks_ties_by_first_seen() {
        let evs = arc(vec![
            Event::new(NOW, "1", "a", "cat go rust"),
            Event::new(NOW, "1", "a", "go rust go rust go rust go rust cat cat"),
        ]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        assert_eq!(snap.top_words(10), vec![("go", 5), ("rust", 5), ("cat", 3)]);
    }

    #[test]
    fn top_words_clamps_below_limit() {
        let evs = arc(vec![Event::new(NOW, "1", "a", "alpha beta gamma")]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        assert_eq!(snap.top_words(DEFAULT_TOP_WORDS).len(), 3);
    }

    #[test]
    fn users_keyed_by_id_and_name_pair() {
        let evs = arc(vec![
            Event::new(NOW, "1", "old name", "x1"),
            Event::new(NOW, "1", "new name", "x2"),
            Event::new(NOW, "1", "new name", "x3"),
            Event::new(NOW, "2", "bob", "x4"),
            Event::new(NOW, "3", "al", "x5"),
        ]);
        let snap = agg().compute(&evs, NOW, WINDOW);
        let ranking: Vec<(&str, u64)> = snap
            .user_ranking()
            .into_iter()
            .map(|(a, n)| (a.name.as_str(), n))
            .collect();
        assert_eq!(
            ranking,
            vec![("new name", 2), ("al", 1), ("bob", 1), ("old name", 1)]
        );
    }

    #[test]
    fn anon_id_is_stable_and_short() {
        let mut ev = Event::new(1, "1", "a", "t");
        ev.id = Some("123".into());
        assert_eq!(anon_id(&ev), anon_id(&ev.clone()));
        assert_eq!(anon_id(&ev).len(), 12);
    }
}
