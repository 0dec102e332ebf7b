// src/ingest/types.rs
use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::event::EventError;
use crate::ingest::StreamListener;

/// What happened to one delivered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Appended,
    /// No timestamp or a retweet; dropped without noise.
    Skipped,
    /// Undecodable record.
    Invalid(EventError),
    /// Delivered after shutdown started.
    Closed,
}

/// Connection to an upstream post stream, tracking one keyword.
///
/// Implementations own transport, credentials and reconnects, and report through
/// the listener callbacks. Returning `Err` means the connection is lost for good
/// and the process should terminate.
#[async_trait::async_trait]
pub trait StreamSource: Send {
    async fn run(
        &mut self,
        keyword: &str,
        listener: &StreamListener,
        cancel: CancellationToken,
    ) -> Result<()>;

    fn name(&self) -> &'static str;
}
