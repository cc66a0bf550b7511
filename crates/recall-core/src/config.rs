//! Memory manager configuration.
//!
//! Defaults match the behavior agents expect out of the box; every field can
//! be overridden through `RECALL_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Tunables for session tracking, compaction and context assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Budget used by `get_context` when the caller does not pass one.
    pub max_context_tokens: usize,
    /// Hot-state token estimate above which compaction is considered.
    pub summarization_threshold: f64,
    /// Factor applied to the token estimate after a compaction.
    pub compression_ratio: f64,
    /// Minimum hot turns before a session may be compacted.
    pub minimum_batch: usize,
    /// Turns fetched from the ledger when restoring a session.
    pub restore_window: usize,
    /// Turns returned on the cheap context path.
    pub recent_window: usize,
    /// Verbatim tail appended on the retrieval path.
    pub verbatim_recent: usize,
    /// Historical fragments requested on the retrieval path.
    pub search_limit: usize,
    pub ledger_timeout_ms: u64,
    pub summarizer_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4000,
            summarization_threshold: 2000.0,
            compression_ratio: 0.5,
            minimum_batch: 5,
            restore_window: 20,
            recent_window: 10,
            verbatim_recent: 3,
            search_limit: 5,
            ledger_timeout_ms: 10_000,
            summarizer_timeout_ms: 60_000,
        }
    }
}

impl MemoryConfig {
    /// Defaults overridden by any `RECALL_*` variables that are set.
    pub fn from_env() -> MemoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MemoryConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> MemoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        override_from(&lookup, "RECALL_MAX_CONTEXT_TOKENS", &mut config.max_context_tokens)?;
        override_from(
            &lookup,
            "RECALL_SUMMARIZATION_THRESHOLD",
            &mut config.summarization_threshold,
        )?;
        override_from(&lookup, "RECALL_COMPRESSION_RATIO", &mut config.compression_ratio)?;
        override_from(&lookup, "RECALL_MINIMUM_BATCH", &mut config.minimum_batch)?;
        override_from(&lookup, "RECALL_RESTORE_WINDOW", &mut config.restore_window)?;
        override_from(&lookup, "RECALL_RECENT_WINDOW", &mut config.recent_window)?;
        override_from(&lookup, "RECALL_VERBATIM_RECENT", &mut config.verbatim_recent)?;
        override_from(&lookup, "RECALL_SEARCH_LIMIT", &mut config.search_limit)?;
        override_from(&lookup, "RECALL_LEDGER_TIMEOUT_MS", &mut config.ledger_timeout_ms)?;
        override_from(
            &lookup,
            "RECALL_SUMMARIZER_TIMEOUT_MS",
            &mut config.summarizer_timeout_ms,
        )?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_summarization_threshold(mut self, threshold: f64) -> Self {
        self.summarization_threshold = threshold;
        self
    }

    pub fn with_minimum_batch(mut self, minimum_batch: usize) -> Self {
        self.minimum_batch = minimum_batch;
        self
    }

    pub fn with_compression_ratio(mut self, ratio: f64) -> Self {
        self.compression_ratio = ratio;
        self
    }

    pub fn with_summarizer_timeout(mut self, timeout: Duration) -> Self {
        self.summarizer_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_ledger_timeout(mut self, timeout: Duration) -> Self {
        self.ledger_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn summarizer_timeout(&self) -> Duration {
        Duration::from_millis(self.summarizer_timeout_ms)
    }

    /// Reject configurations the algorithms cannot run with.
    pub fn validate(&self) -> MemoryResult<()> {
        let invalid = |msg: String| Err(MemoryError::InvalidConfig(msg));

        if !(self.compression_ratio > 0.0 && self.compression_ratio <= 1.0) {
            return invalid(format!(
                "compression_ratio must be in (0, 1], got {}",
                self.compression_ratio
            ));
        }
        if !(self.summarization_threshold > 0.0) {
            return invalid(format!(
                "summarization_threshold must be positive, got {}",
                self.summarization_threshold
            ));
        }
        if self.minimum_batch < 2 {
            return invalid(format!(
                "minimum_batch must be at least 2, got {}",
                self.minimum_batch
            ));
        }
        let windows = [
            ("restore_window", self.restore_window),
            ("recent_window", self.recent_window),
            ("verbatim_recent", self.verbatim_recent),
            ("search_limit", self.search_limit),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, v)| *v == 0) {
            return invalid(format!("{name} must be at least 1"));
        }
        if self.ledger_timeout_ms == 0 || self.summarizer_timeout_ms == 0 {
            return invalid("timeouts must be non-zero".to_string());
        }
        Ok(())
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T) -> MemoryResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| MemoryError::InvalidConfig(format!("{key}={raw:?} is not valid")))?;
    }
    Ok(())
}
