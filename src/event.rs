// src/event.rs
//! Event model for a single ingested post, plus parsing of the raw JSON records
//! delivered by the stream.
//!
//! Parsing is deliberately tolerant: only the timestamp and the retweet marker are
//! checked at ingestion time. Everything else the statistics need (author, text) is
//! validated per cycle by the aggregator, so one broken record costs one skipped
//! event instead of a failed append.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Per-event failures. None of these abort a reporting cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("record is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("event has no author")]
    MissingAuthor,
    #[error("event author has no {0}")]
    IncompleteAuthor(&'static str),
    #[error("event has no text")]
    MissingText,
}

/// The poster of an event. `(id, name)` is the aggregation key for user activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// One ingested post. Immutable once appended to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: Option<String>,
    /// Milliseconds since the epoch, as reported by the source.
    pub timestamp_ms: i64,
    pub user: Option<Author>,
    pub text: Option<String>,
    /// Untruncated body; supersedes `text` when present.
    pub extended_text: Option<String>,
    pub urls: Vec<String>,
    /// Links of the untruncated body; supersede `urls` when present.
    pub extended_urls: Option<Vec<String>>,
    pub is_retweet: bool,
}

impl Event {
    /// Minimal well-formed event, mostly useful for tests and replay tooling.
    pub fn new(timestamp_ms: i64, user_id: &str, user_name: &str, text: &str) -> Self {
        Self {
            id: None,
            timestamp_ms,
            user: Some(Author {
                id: user_id.to_string(),
                name: user_name.to_string(),
            }),
            text: Some(text.to_string()),
            extended_text: None,
            urls: Vec::new(),
            extended_urls: None,
            is_retweet: false,
        }
    }

    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extended(mut self, text: &str, urls: Vec<String>) -> Self {
        self.extended_text = Some(text.to_string());
        self.extended_urls = Some(urls);
        self
    }

    pub fn retweet(mut self) -> Self {
        self.is_retweet = true;
        self
    }

    /// Author, or the reason the event cannot be attributed.
    pub fn author(&self) -> Result<&Author, EventError> {
        let user = self.user.as_ref().ok_or(EventError::MissingAuthor)?;
        if user.id.is_empty() {
            return Err(EventError::IncompleteAuthor("id"));
        }
        if user.name.is_empty() {
            return Err(EventError::IncompleteAuthor("name"));
        }
        Ok(user)
    }

    /// Extended body if the source sent one, otherwise the primary body.
    pub fn effective_text(&self) -> Result<&str, EventError> {
        self.extended_text
            .as_deref()
            .or(self.text.as_deref())
            .ok_or(EventError::MissingText)
    }

    /// Extended link list if present, otherwise the primary one.
    pub fn effective_urls(&self) -> &[String] {
        self.extended_urls.as_deref().unwrap_or(&self.urls)
    }
}

/* ----------------------------
Raw record schema
---------------------------- */

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64_lenient")]
    timestamp_ms: Option<i64>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    entities: Option<RawEntities>,
    #[serde(default)]
    extended_tweet: Option<RawExtended>,
    #[serde(default)]
    retweeted_status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntities {
    #[serde(default)]
    urls: Vec<RawUrl>,
}

#[derive(Debug, Deserialize)]
struct RawUrl {
    #[serde(default)]
    expanded_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExtended {
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    entities: Option<RawEntities>,
}

/// The source sends `timestamp_ms` as a decimal string; accept plain integers too.
fn de_opt_i64_lenient<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match v {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn expanded_urls(entities: Option<RawEntities>) -> Vec<String> {
    entities
        .unwrap_or_default()
        .urls
        .into_iter()
        .filter_map(|u| u.expanded_url)
        .collect()
}

fn decode_text(s: String) -> String {
    html_escape::decode_html_entities(&s).into_owned()
}

impl RawUser {
    fn into_author(self) -> Option<Author> {
        let id = self.id_str.or_else(|| match self.id {
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })?;
        Some(Author {
            id,
            name: self.name.unwrap_or_default(),
        })
    }
}

/// Parse one raw stream record.
///
/// Returns `Ok(None)` for records that are skipped silently: no timestamp (control
/// messages such as limit notices) or retweets.
pub fn parse_record(raw: &str) -> Result<Option<Event>, EventError> {
    let rec: RawRecord =
        serde_json::from_str(raw).map_err(|e| EventError::InvalidJson(e.to_string()))?;

    let Some(timestamp_ms) = rec.timestamp_ms else {
        return Ok(None);
    };
    if rec.retweeted_status.is_some() {
        return Ok(None);
    }

    let (extended_text, extended_urls) = match rec.extended_tweet {
        Some(ext) => (
            ext.full_text.map(decode_text),
            Some(expanded_urls(ext.entities)),
        ),
        None => (None, None),
    };

    Ok(Some(Event {
        id: rec.id_str,
        timestamp_ms,
        user: rec.user.and_then(RawUser::into_author),
        text: rec.text.map(decode_text),
        extended_text,
        urls: expanded_urls(rec.entities),
        extended_urls,
        is_retweet: false,
    }))
}
