//! Word-based token estimation.
//!
//! An approximation, not a tokenizer: whitespace-separated words times a
//! fixed multiplier.

/// Estimated tokens per whitespace-separated word.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimate token count from text (words × [`TOKENS_PER_WORD`]).
pub fn estimate_tokens(text: &str) -> f64 {
    word_count(text) as f64 * TOKENS_PER_WORD
}

/// Estimate for a user/assistant exchange.
pub fn estimate_turn_tokens(user_message: &str, response: &str) -> f64 {
    (word_count(user_message) + word_count(response)) as f64 * TOKENS_PER_WORD
}
