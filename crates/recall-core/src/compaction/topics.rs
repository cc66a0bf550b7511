//! Topic extraction strategies.
//!
//! Compaction asks a [`TopicExtractor`] for the topics of a summary; the
//! session tracker asks the same extractor about incoming user messages.

use std::sync::OnceLock;

use regex::Regex;

/// Upper bound on topics attached to a summary.
pub const MAX_TOPICS: usize = 10;

/// Turns free text into a short, ordered list of topic labels.
pub trait TopicExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

static CAPITALIZED: OnceLock<Option<Regex>> = OnceLock::new();

fn capitalized_words() -> Option<&'static Regex> {
    CAPITALIZED
        .get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\b").ok())
        .as_ref()
}

fn trim_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Indicator-word and capitalized-word heuristics.
///
/// A word following one of the indicators ("about", "regarding", ...) is a
/// topic; so are the first few capitalized words. Results are deduplicated
/// in first-seen order and capped.
#[derive(Debug, Clone)]
pub struct HeuristicTopicExtractor {
    indicators: Vec<String>,
    max_capitalized: usize,
}

impl Default for HeuristicTopicExtractor {
    fn default() -> Self {
        Self {
            indicators: ["about", "regarding", "concerning", "discussing"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_capitalized: 5,
        }
    }
}

impl HeuristicTopicExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indicators(mut self, indicators: Vec<String>) -> Self {
        self.indicators = indicators.into_iter().map(|i| i.to_lowercase()).collect();
        self
    }
}

impl TopicExtractor for HeuristicTopicExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let mut candidates: Vec<String> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            if !self.indicators.iter().any(|ind| ind == trim_word(word)) {
                continue;
            }
            if let Some(next) = words.get(i + 1).map(|w| trim_word(w)) {
                if !next.is_empty() {
                    candidates.push(next.to_string());
                }
            }
        }

        if let Some(re) = capitalized_words() {
            candidates.extend(
                re.find_iter(text)
                    .take(self.max_capitalized)
                    .map(|m| m.as_str().to_string()),
            );
        }

        let mut topics: Vec<String> = Vec::new();
        for candidate in candidates {
            if !topics.contains(&candidate) {
                topics.push(candidate);
            }
        }
        topics.truncate(MAX_TOPICS);
        topics
    }
}
