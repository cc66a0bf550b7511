//! Session compaction.
//!
//! When a hot session grows past the summarization threshold, the oldest
//! half of its turns is summarized, the summary is written to the ledger,
//! and only then is the prefix evicted from hot state. Any failure along
//! the way leaves the session exactly as it was.

pub mod topics;
pub mod transcript;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_ledger::{Ledger, LedgerRecord, NewTurn, TurnId, TurnMetadata};
use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::error::{ledger_call, MemoryError, MemoryResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::session::{Session, SessionStore};
use crate::summarizer::Summarizer;
use crate::tokens::word_count;

use self::topics::{TopicExtractor, MAX_TOPICS};
use self::transcript::{render_transcript, summary_prompt};

/// Suffix of the ledger session that holds a session's summaries.
pub const SUMMARY_SESSION_SUFFIX: &str = "_summary";

/// User-message placeholder on summary records.
pub const SUMMARY_MESSAGE: &str = "CONVERSATION_SUMMARY";

/// Ledger session id under which summaries of `session_id` are stored.
pub fn summary_session_id(session_id: &str) -> String {
    format!("{session_id}{SUMMARY_SESSION_SUFFIX}")
}

/// Abstractive summary of a contiguous run of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub covered_turn_count: usize,
    pub topics: Vec<String>,
    pub urls_mentioned: BTreeSet<String>,
    pub summary_text: String,
    pub original_token_estimate: f64,
    pub compressed_token_estimate: f64,
}

impl TryFrom<LedgerRecord> for Summary {
    type Error = MemoryError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        let malformed = |reason: String| MemoryError::MalformedSessionState {
            record_id: record.id.0.clone(),
            reason,
        };
        if !record.metadata.is_summary() {
            return Err(malformed("not a summary record".to_string()));
        }
        let body = record
            .response
            .as_deref()
            .ok_or_else(|| malformed("missing summary body".to_string()))?;
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))
    }
}

/// The slice of [`MemoryConfig`] compaction runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactionSettings {
    pub summarization_threshold: f64,
    pub minimum_batch: usize,
    pub compression_ratio: f64,
    pub summarizer_timeout: Duration,
    pub ledger_timeout: Duration,
}

impl From<&MemoryConfig> for CompactionSettings {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            summarization_threshold: config.summarization_threshold,
            minimum_batch: config.minimum_batch,
            compression_ratio: config.compression_ratio,
            summarizer_timeout: config.summarizer_timeout(),
            ledger_timeout: config.ledger_timeout(),
        }
    }
}

/// What a compaction check did.
#[derive(Debug, Clone, PartialEq)]
pub enum CompactionOutcome {
    NotNeeded,
    Compacted(Summary),
    /// Summarizer or ledger failure, or a conflicting change; hot state untouched.
    Aborted { reason: String },
}

impl CompactionOutcome {
    pub fn is_compacted(&self) -> bool {
        matches!(self, CompactionOutcome::Compacted(_))
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            CompactionOutcome::Compacted(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Decides when a session is compacted and carries it out.
pub struct CompactionPolicy {
    ledger: Arc<dyn Ledger>,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<SessionStore>,
    topics: Arc<dyn TopicExtractor>,
    settings: CompactionSettings,
}

impl CompactionPolicy {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<SessionStore>,
        topics: Arc<dyn TopicExtractor>,
        settings: CompactionSettings,
    ) -> Self {
        Self {
            ledger,
            summarizer,
            store,
            topics,
            settings,
        }
    }

    pub fn should_compact(&self, session: &Session) -> bool {
        session.token_estimate() > self.settings.summarization_threshold
            && session.len() >= self.settings.minimum_batch
    }

    /// Compact `session_id` if it is over budget.
    ///
    /// Failures are logged and counted, never returned: the caller's turn
    /// has already been recorded and must not fail because of this.
    pub async fn maybe_compact(&self, session_id: &str) -> CompactionOutcome {
        let Some(session) = self.store.get(session_id) else {
            return CompactionOutcome::NotNeeded;
        };
        if !self.should_compact(&session) {
            return CompactionOutcome::NotNeeded;
        }

        let tokens_before = session.token_estimate();
        match self.compact(&session).await {
            Ok((summary, tokens_after)) => {
                METRICS.inc_compactions();
                obs::emit_compaction_completed(
                    session_id,
                    summary.covered_turn_count,
                    tokens_before,
                    tokens_after,
                );
                CompactionOutcome::Compacted(summary)
            }
            Err(err) => {
                METRICS.inc_compaction_failures();
                obs::emit_compaction_aborted(session_id, &err);
                CompactionOutcome::Aborted {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn compact(&self, session: &Session) -> MemoryResult<(Summary, f64)> {
        let session_id = session.session_id();
        let batch = &session.turns()[..session.len() / 2];
        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            return Err(MemoryError::SummarizationFailure(
                "nothing to summarize".to_string(),
            ));
        };

        let prompt = summary_prompt(&render_transcript(batch));
        let summary_text = self.summarize(&prompt).await?;

        let mut topics = self.topics.extract(&summary_text);
        topics.truncate(MAX_TOPICS);
        let urls_mentioned: BTreeSet<String> =
            batch.iter().flat_map(|t| t.urls.iter().cloned()).collect();

        let summary = Summary {
            session_id: session_id.to_string(),
            start_time: first.timestamp,
            end_time: last.timestamp,
            covered_turn_count: batch.len(),
            topics,
            urls_mentioned,
            compressed_token_estimate: word_count(&summary_text) as f64,
            original_token_estimate: session.token_estimate() * 0.5,
            summary_text,
        };

        let record = NewTurn::new(
            summary_session_id(session_id),
            SUMMARY_MESSAGE,
            serde_json::to_string(&summary)?,
            Utc::now(),
        )
        .with_urls(summary.urls_mentioned.iter().cloned().collect())
        .with_metadata(TurnMetadata::summary_of(session_id));
        ledger_call(
            "store_summary",
            self.settings.ledger_timeout,
            self.ledger.store_turn(record),
        )
        .await?;

        let ids: Vec<TurnId> = batch.iter().map(|t| t.id.clone()).collect();
        let ratio = self.settings.compression_ratio;
        self.store
            .update(session_id, |s| {
                s.evict_prefix(&ids, ratio).then(|| s.token_estimate())
            })
            .flatten()
            .map(|tokens_after| (summary, tokens_after))
            .ok_or_else(|| MemoryError::CompactionConflict {
                session_id: session_id.to_string(),
            })
    }

    async fn summarize(&self, prompt: &str) -> MemoryResult<String> {
        let limit = self.settings.summarizer_timeout;
        match tokio::time::timeout(limit, self.summarizer.summarize(prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text),
            Ok(Ok(_)) => Err(MemoryError::SummarizationFailure(
                "summarizer returned empty text".to_string(),
            )),
            Ok(Err(err)) => Err(MemoryError::SummarizationFailure(err.to_string())),
            Err(_) => Err(MemoryError::SummarizationFailure(format!(
                "timed out after {}ms",
                limit.as_millis()
            ))),
        }
    }
}
