// src/ingest/jsonl.rs
//! Replay source: newline-delimited JSON records from a file or stdin.
//!
//! Stands in for the network stream. Each line is one raw record; a line of the
//! form `{"status": 420}` is delivered to the error callback instead, so captured
//! throttling episodes replay faithfully.
//!
//! Stdin is read on a detached OS thread feeding a channel. A blocking stdin read
//! cannot be interrupted, so it must not live on the runtime's blocking pool.

use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::{parse_record, Event, EventError};
use crate::ingest::types::StreamSource;
use crate::ingest::StreamListener;

const FOLLOW_POLL: Duration = Duration::from_millis(250);
const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatusLine {
    status: u16,
}

#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: Option<PathBuf>,
    follow: bool,
    poll: Duration,
}

impl JsonLinesSource {
    /// Read from `path`, or stdin when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            follow: false,
            poll: FOLLOW_POLL,
        }
    }

    /// Keep polling for appended lines at EOF (like `tail -f`) until cancelled.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    async fn open(&self) -> Result<LineFeed> {
        Ok(match &self.path {
            Some(p) => {
                let f = tokio::fs::File::open(p)
                    .await
                    .with_context(|| format!("opening stream file {}", p.display()))?;
                LineFeed::File(BufReader::new(f))
            }
            None => LineFeed::from_reader(io::stdin()).context("spawning stdin reader")?,
        })
    }

    /// Deliver lines from `feed` until it ends (and `follow` is off) or `cancel` fires.
    async fn pump(
        &self,
        mut feed: LineFeed,
        keyword: &str,
        listener: &StreamListener,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                l = feed.next_line() => l.context("reading stream")?,
            };
            match next {
                Some(bytes) => match String::from_utf8(bytes) {
                    Ok(line) => dispatch(&line, keyword, listener),
                    Err(e) => {
                        tracing::warn!(target: "ingest", "dropping line that is not UTF-8");
                        listener.on_record(Err(EventError::InvalidJson(e.to_string())));
                    }
                },
                None if self.follow => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll) => {}
                    }
                }
                None => {
                    tracing::info!(target: "ingest", "stream exhausted");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Raw newline-terminated lines, without the terminator.
enum LineFeed {
    File(BufReader<tokio::fs::File>),
    Thread(mpsc::Receiver<io::Result<Vec<u8>>>),
}

impl LineFeed {
    /// Read `reader` on its own thread. The thread ends at EOF, on a read error, or
    /// once the receiving side is gone and the next line arrives.
    fn from_reader<R>(reader: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        std::thread::Builder::new()
            .name("stream-reader".into())
            .spawn(move || {
                let mut reader = io::BufReader::new(reader);
                loop {
                    let mut buf = Vec::new();
                    let item = match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => Ok(buf),
                        Err(e) => Err(e),
                    };
                    let failed = item.is_err();
                    if tx.blocking_send(item).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(LineFeed::Thread(rx))
    }

    async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = match self {
            LineFeed::File(r) => {
                let mut buf = Vec::new();
                if r.read_until(b'\n', &mut buf).await? == 0 {
                    return Ok(None);
                }
                buf
            }
            LineFeed::Thread(rx) => match rx.recv().await {
                Some(item) => item?,
                None => return Ok(None),
            },
        };
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// Case-insensitive keyword match on the effective text. Records without text are
/// let through so the aggregator can account for them.
pub fn tracks(ev: &Event, keyword: &str) -> bool {
    match ev.effective_text() {
        Ok(t) => t.to_lowercase().contains(&keyword.to_lowercase()),
        Err(_) => true,
    }
}

fn dispatch(line: &str, keyword: &str, listener: &StreamListener) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if let Ok(s) = serde_json::from_str::<StatusLine>(line) {
        listener.on_error(s.status);
        return;
    }
    let record = parse_record(line);
    if let Ok(Some(ev)) = &record {
        if !tracks(ev, keyword) {
            return;
        }
    }
    listener.on_record(record);
}

#[async_trait]
impl StreamSource for JsonLinesSource {
    async fn run(
        &mut self,
        keyword: &str,
        listener: &StreamListener,
        cancel: CancellationToken,
    ) -> Result<()> {
        let feed = self.open().await?;
        listener.on_connect();
        tracing::info!(target: "ingest", source = self.name(), keyword, follow = self.follow, "tracking keyword");
        self.pump(feed, keyword, listener, cancel).await
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
