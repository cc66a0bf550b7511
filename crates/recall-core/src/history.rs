//! Agent-facing renderings of ledger search results.

use recall_ledger::SearchHit;

pub const NO_HISTORY: &str = "No relevant conversation history found.";

fn prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn stamp(hit: &SearchHit) -> String {
    hit.timestamp.format("%Y-%m-%d %H:%M").to_string()
}

/// Timestamped, scored excerpts for a conversation-history search.
pub fn format_history_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_HISTORY.to_string();
    }
    hits.iter()
        .map(|hit| {
            format!(
                "[{}] (Score: {:.2})\nUser: {}\nAssistant: {}...",
                stamp(hit),
                hit.score,
                hit.message,
                prefix(&hit.response, 200)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// URL listing with a short message excerpt per hit.
pub fn format_url_hits(url: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No conversations found involving URLs matching '{url}'.");
    }
    hits.iter()
        .map(|hit| {
            let urls = if hit.urls.is_empty() {
                "No URLs".to_string()
            } else {
                hit.urls.join(", ")
            };
            format!(
                "[{}] URLs: {urls}\nContext: {}...",
                stamp(hit),
                prefix(&hit.message, 150)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
