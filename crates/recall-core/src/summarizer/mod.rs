//! Summarizer boundary.
//!
//! Compaction hands a prompt-wrapped transcript to a [`Summarizer`] and
//! treats whatever comes back as opaque summary text.

pub mod fakes;
pub mod http;

use async_trait::async_trait;

pub use http::{ChatCompletionsSummarizer, SummarizerConfig};

/// Errors a summarizer backend can report.
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("summarizer API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("summarizer returned no content")]
    EmptyResponse,

    #[error("summarizer unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for SummarizerError {
    fn from(err: reqwest::Error) -> Self {
        SummarizerError::Http(err.to_string())
    }
}

/// Black-box text compression service.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Compress `transcript` (already wrapped with instructions) into summary text.
    async fn summarize(&self, transcript: &str) -> Result<String, SummarizerError>;
}
