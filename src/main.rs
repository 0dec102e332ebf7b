//! Keyword window statistics: binary entrypoint.
//! Reads the keyword, wires buffer, listener and report scheduler, then streams
//! until the source ends for good or the user interrupts.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use keyword_window_stats::analyze::{StopWords, WordTokenizer};
use keyword_window_stats::ingest::ensure_metrics_described;
use keyword_window_stats::report::StdoutSink;
use keyword_window_stats::{
    Aggregator, AppConfig, EventBuffer, JsonLinesSource, RateLimitSignal, ReportScheduler,
    SchedulerCfg, StreamListener, StreamSource,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs go to stderr so they never interleave with reports on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Ask until a non-blank keyword is entered.
fn prompt_keyword<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<String> {
    let mut line = String::new();
    loop {
        write!(out, "Enter the keyword to track: ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            bail!("no keyword entered");
        }
        let keyword = line.trim();
        if !keyword.is_empty() {
            return Ok(keyword.to_string());
        }
        writeln!(out, "Please enter a valid keyword\n")?;
    }
}

/// Prompt on stdin, or on the controlling terminal when stdin carries the stream.
fn read_keyword(stdin_is_stream: bool) -> Result<String> {
    if !stdin_is_stream {
        return prompt_keyword(&mut std::io::stdin().lock(), &mut std::io::stdout());
    }
    let tty = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .context("stream is on stdin and no terminal is available; set TRACK_KEYWORD")?;
    let mut out = tty.try_clone().context("cloning terminal handle")?;
    prompt_keyword(&mut BufReader::new(tty), &mut out)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    ensure_metrics_described();
    if let Some(addr) = cfg.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("prometheus: install recorder")?;
        info!(%addr, "metrics endpoint listening");
    }

    let keyword = match &cfg.keyword {
        Some(k) => k.trim().to_string(),
        None => {
            let stdin_is_stream = cfg.stream_path.is_none();
            tokio::task::spawn_blocking(move || read_keyword(stdin_is_stream)).await??
        }
    };

    let stop_words = match &cfg.stop_words_path {
        Some(p) => StopWords::load_from(p)?,
        None => StopWords::english(),
    };

    let buffer = Arc::new(EventBuffer::new());
    let rate_limit = RateLimitSignal::new();
    let shutdown = CancellationToken::new();

    let listener = StreamListener::new(buffer.clone(), rate_limit.clone())
        .with_rate_limit_status(cfg.rate_limit_status)
        .with_shutdown(shutdown.clone());

    let scheduler = ReportScheduler::new(
        SchedulerCfg {
            interval: cfg.report_interval(),
            window_ms: cfg.window_ms,
        },
        buffer,
        Aggregator::new(Arc::new(WordTokenizer), Arc::new(stop_words)),
        rate_limit,
        Arc::new(StdoutSink {
            top_k: cfg.top_words,
        }),
    )
    .spawn(shutdown.clone());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("keyboard interrupt, exiting...");
                    shutdown.cancel();
                }
                Err(e) => {
                    tracing::error!("failed to listen for ctrl-c: {e}");
                    return;
                }
            }
            // second interrupt skips graceful shutdown
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("second interrupt, exiting immediately");
                std::process::exit(130);
            }
        });
    }

    let mut source = JsonLinesSource::new(cfg.stream_path.clone()).follow(cfg.stream_follow);
    if let Err(e) = source.run(&keyword, &listener, shutdown.clone()).await {
        shutdown.cancel();
        let _ = scheduler.await;
        return Err(e.context(format!("{} stream failed", source.name())));
    }
    info!("stream disconnected");

    // Source drained without an interrupt: keep reporting on what is left.
    shutdown.cancelled().await;
    scheduler.await.context("report scheduler panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_asks_again_on_blank_input() {
        let mut input = Cursor::new("\n   \n rust \n");
        let mut out = Vec::new();
        assert_eq!(prompt_keyword(&mut input, &mut out).unwrap(), "rust");

        let shown = String::from_utf8(out).unwrap();
        assert_eq!(shown.matches("Enter the keyword to track: ").count(), 3);
        assert_eq!(shown.matches("Please enter a valid keyword").count(), 2);
    }

    #[test]
    fn prompt_fails_at_end_of_input() {
        let mut input = Cursor::new("\n");
        assert!(prompt_keyword(&mut input, &mut Vec::new()).is_err());
    }
}
