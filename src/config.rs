// src/config.rs
//! Runtime configuration.
//!
//! Precedence (highest first):
//! 1) environment variables (`WINDOW_MS`, `REPORT_INTERVAL_SECS`, ...; `.env` is honored)
//! 2) TOML file at `$STATS_CONFIG_PATH`, or `config/stats.toml` when it exists
//! 3) built-in defaults (5 minute window, report every 60s, top 10 words)

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "STATS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/stats.toml";

/// Status code the source uses to signal rate limiting.
pub const DEFAULT_RATE_LIMIT_STATUS: u16 = 420;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Trailing window length in milliseconds.
    pub window_ms: u64,
    pub report_interval_secs: u64,
    pub top_words: usize,
    pub rate_limit_status: u16,
    /// Newline-delimited JSON to replay; stdin when unset.
    pub stream_path: Option<PathBuf>,
    /// Keep reading the stream file as it grows instead of stopping at EOF.
    pub stream_follow: bool,
    /// Replaces the built-in English stop-word list.
    pub stop_words_path: Option<PathBuf>,
    /// Prometheus scrape endpoint; disabled when unset.
    pub metrics_addr: Option<SocketAddr>,
    /// Skips the interactive prompt when set.
    pub keyword: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_ms: 5 * 60 * 1_000,
            report_interval_secs: 60,
            top_words: crate::analyze::DEFAULT_TOP_WORDS,
            rate_limit_status: DEFAULT_RATE_LIMIT_STATUS,
            stream_path: None,
            stream_follow: false,
            stop_words_path: None,
            metrics_addr: None,
            keyword: None,
        }
    }
}

impl AppConfig {
    /// Load file + environment and validate.
    pub fn load() -> Result<Self> {
        let mut cfg = match config_path()? {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Override fields from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "WINDOW_MS")? {
            self.window_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_INTERVAL_SECS")? {
            self.report_interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TOP_WORDS")? {
            self.top_words = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_STATUS")? {
            self.rate_limit_status = v;
        }
        if let Some(v) = parse_var(&lookup, "STREAM_FOLLOW")? {
            self.stream_follow = v;
        }
        if let Some(v) = parse_var(&lookup, "METRICS_ADDR")? {
            self.metrics_addr = Some(v);
        }
        if let Some(v) = non_empty(&lookup, "STREAM_PATH") {
            self.stream_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&lookup, "STOP_WORDS_PATH") {
            self.stop_words_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&lookup, "TRACK_KEYWORD") {
            self.keyword = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            bail!("window_ms must be greater than zero");
        }
        if self.report_interval_secs == 0 {
            bail!("report_interval_secs must be greater than zero");
        }
        if self.top_words == 0 {
            bail!("top_words must be greater than zero");
        }
        if let Some(k) = &self.keyword {
            if k.trim().is_empty() {
                bail!("keyword must not be blank");
            }
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        return Ok(Some(pb));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

fn non_empty<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {name}={raw:?}: {e}")),
    }
}
