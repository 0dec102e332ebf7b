// src/analyze/tokenizer.rs
//! Word tokenization for content statistics.

use once_cell::sync::Lazy;
use regex::Regex;

/// Turns lower-cased text into word tokens with punctuation removed.
///
/// Implementations must be pure: the aggregator calls them from a blocking worker
/// and may share one instance across cycles.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, lowercased: &str) -> Vec<String>;
}

static RE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\w+(?:['’]\w+)*").expect("word regex"));

/// Default tokenizer: Unicode word runs, keeping inner apostrophes (`don't`).
///
/// A trailing possessive is emitted as its own `'s` token (`rust's` → `rust`, `'s`),
/// which is how NLP tokenizers commonly split it; the aggregator drops that
/// fragment explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, lowercased: &str) -> Vec<String> {
        let mut out = Vec::new();
        for m in RE_WORD.find_iter(lowercased) {
            let word = m.as_str().replace('’', "'");
            match word.strip_suffix("'s") {
                Some(stem) if !stem.is_empty() => {
                    out.push(stem.to_string());
                    out.push("'s".to_string());
                }
                _ => out.push(word),
            }
        }
        out
    }
}
