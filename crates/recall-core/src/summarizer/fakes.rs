//! In-process summarizers for tests and offline runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Summarizer, SummarizerError};

/// Returns the same text for every call and records the prompts it saw.
#[derive(Debug, Default)]
pub struct StaticSummarizer {
    text: String,
    prompts: Mutex<Vec<String>>,
}

impl StaticSummarizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Summarizer for StaticSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, SummarizerError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(transcript.to_string());
        }
        Ok(self.text.clone())
    }
}

/// Fails every call.
#[derive(Debug, Default)]
pub struct FailingSummarizer {
    calls: AtomicU64,
}

impl FailingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _transcript: &str) -> Result<String, SummarizerError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(SummarizerError::Unavailable("model offline".to_string()))
    }
}

/// Answers only after `delay`; pairs with paused-clock tests for timeouts.
#[derive(Debug)]
pub struct SlowSummarizer {
    delay: Duration,
    text: String,
}

impl SlowSummarizer {
    pub fn new(delay: Duration, text: impl Into<String>) -> Self {
        Self {
            delay,
            text: text.into(),
        }
    }
}

#[async_trait]
impl Summarizer for SlowSummarizer {
    async fn summarize(&self, _transcript: &str) -> Result<String, SummarizerError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.clone())
    }
}
