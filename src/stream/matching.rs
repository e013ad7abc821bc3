//! Title matching between a catalog title and free-text stream titles.
//!
//! Addons happily return streams for the wrong title. A stream is kept only
//! when enough of the target's significant words appear in its title.

use std::collections::HashSet;

/// Words that carry no identifying weight.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "to", "in", "on", "at", "by", "for", "with", "it", "is",
    "chapter", "part", "season", "episode", "s", "e",
];

/// Fraction of significant target words that must be found.
const MATCH_RATIO: f64 = 0.75;

/// Lowercase and replace every non-alphanumeric character with a space.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().collect::<String>()
            } else {
                " ".to_string()
            }
        })
        .collect()
}

/// Normalized target words with stop words removed.
pub fn significant_words(title: &str) -> Vec<String> {
    normalize(title)
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Precompiled matcher for one target title.
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    words: Vec<String>,
}

impl TitleMatcher {
    pub fn new(target_title: &str) -> Self {
        Self {
            words: significant_words(target_title),
        }
    }

    /// Whether `stream_title` refers to the target title.
    ///
    /// Single-character words must equal a token exactly so that "X" does
    /// not match inside "x264". Longer words match as substrings of a token
    /// ("derry" in "derrys"). Titles with one or two significant words need
    /// every word; longer titles need at least 75%.
    pub fn matches(&self, stream_title: &str) -> bool {
        if self.words.is_empty() {
            return true;
        }

        let normalized = normalize(stream_title);
        let tokens: HashSet<&str> = normalized.split_whitespace().collect();

        let matched = self
            .words
            .iter()
            .filter(|word| {
                if word.chars().count() == 1 {
                    tokens.contains(word.as_str())
                } else {
                    tokens.iter().any(|t| t.contains(word.as_str()))
                }
            })
            .count();

        #[allow(clippy::cast_precision_loss)]
        let ratio = matched as f64 / self.words.len() as f64;
        ratio >= MATCH_RATIO
    }
}
