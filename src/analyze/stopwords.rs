// src/analyze/stopwords.rs
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_EN: &str = include_str!("../../stop_words_en.txt");

/// Fixed set of function words excluded from word counts. Loaded once at startup,
/// queried by membership only.
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    /// Built-in English list.
    pub fn english() -> Self {
        Self::parse(BUILTIN_EN)
    }

    /// Load a list from disk: one word per line, `#` starts a comment line.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading stop words from {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let words = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.to_lowercase())
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        Self::english()
    }
}

impl<S: AsRef<str>> FromIterator<S> for StopWords {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
        }
    }
}
