//! Turn recording and session restoration.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_ledger::{Ledger, NewTurn, TurnId, TurnMetadata};
use tracing::Instrument;

use super::{Session, SessionStore, Turn};
use crate::compaction::topics::TopicExtractor;
use crate::compaction::{summary_session_id, CompactionOutcome, CompactionPolicy, Summary};
use crate::config::MemoryConfig;
use crate::error::{ledger_call, MemoryError, MemoryResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::tokens::estimate_turn_tokens;

/// Result of recording one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReceipt {
    pub turn_id: TurnId,
    /// What the compaction check after this turn did.
    pub compaction: CompactionOutcome,
}

/// Owns hot-state mutation for new turns and lazy restoration from the ledger.
pub struct SessionTracker {
    ledger: Arc<dyn Ledger>,
    store: Arc<SessionStore>,
    compaction: Arc<CompactionPolicy>,
    topics: Arc<dyn TopicExtractor>,
    restore_window: usize,
    ledger_timeout: Duration,
}

impl SessionTracker {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<SessionStore>,
        compaction: Arc<CompactionPolicy>,
        topics: Arc<dyn TopicExtractor>,
        config: &MemoryConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            compaction,
            topics,
            restore_window: config.restore_window,
            ledger_timeout: config.ledger_timeout(),
        }
    }

    /// Persist a turn, append it to hot state, then compact if due.
    ///
    /// The ledger write happens first; if it fails or times out the call
    /// returns [`MemoryError::LedgerUnavailable`] and hot state is not
    /// touched. Compaction failures never surface here.
    pub async fn add_turn(
        &self,
        session_id: &str,
        user_message: &str,
        response: &str,
        urls: Vec<String>,
        metadata: TurnMetadata,
    ) -> MemoryResult<TurnReceipt> {
        self.record(session_id, user_message, response, urls, metadata)
            .instrument(obs::session_span(session_id))
            .await
    }

    async fn record(
        &self,
        session_id: &str,
        user_message: &str,
        response: &str,
        urls: Vec<String>,
        metadata: TurnMetadata,
    ) -> MemoryResult<TurnReceipt> {
        metadata.validate().map_err(MemoryError::InvalidMetadata)?;

        // Restore before writing so the new turn is not read back twice.
        self.get_or_restore(session_id).await?;

        let timestamp = Utc::now();
        let new_turn = NewTurn::new(session_id, user_message, response, timestamp)
            .with_urls(urls.clone())
            .with_metadata(metadata.clone());
        let turn_id = ledger_call(
            "store_turn",
            self.ledger_timeout,
            self.ledger.store_turn(new_turn),
        )
        .await?;

        let mut topics = self.topics.extract(user_message);
        topics.extend(metadata.category.clone());
        let turn = Turn {
            id: turn_id.clone(),
            session_id: session_id.to_string(),
            user_message: user_message.to_string(),
            assistant_response: response.to_string(),
            timestamp,
            urls: urls.into_iter().collect(),
            metadata,
            token_estimate: estimate_turn_tokens(user_message, response),
        };
        let turn_tokens = turn.token_estimate;

        let session_tokens = self.store.upsert(session_id, |s| {
            s.push_turn(turn, topics);
            s.token_estimate()
        });
        METRICS.inc_turns_recorded();
        obs::emit_turn_recorded(session_id, turn_id.as_str(), turn_tokens, session_tokens);

        let compaction = self.compaction.maybe_compact(session_id).await;
        Ok(TurnReceipt {
            turn_id,
            compaction,
        })
    }

    /// Cached hot state, or hot state rebuilt from the ledger's recent window.
    ///
    /// Turns already covered by the newest summary are left out, as are
    /// records that cannot become turns. A ledger failure caches nothing.
    pub async fn get_or_restore(&self, session_id: &str) -> MemoryResult<Session> {
        if let Some(session) = self.store.get(session_id) {
            return Ok(session);
        }

        let records = ledger_call(
            "get_recent",
            self.ledger_timeout,
            self.ledger.get_recent(session_id, self.restore_window),
        )
        .await?;
        let fetched = records.len();
        let summarized_until = if fetched > 0 {
            self.summarized_until(session_id).await?
        } else {
            None
        };

        let mut turns = Vec::with_capacity(fetched);
        let mut skipped = 0;
        let mut summarized = 0;
        for record in records {
            match Turn::try_from(record) {
                Ok(turn) if summarized_until.is_some_and(|end| turn.timestamp <= end) => {
                    summarized += 1;
                }
                Ok(turn) => turns.push(turn),
                Err(err) => {
                    skipped += 1;
                    obs::emit_record_skipped(session_id, &err);
                }
            }
        }
        METRICS.add_records_skipped(skipped as u64);

        let topics: Vec<String> = turns
            .iter()
            .flat_map(|t| {
                let mut topics = self.topics.extract(&t.user_message);
                topics.extend(t.metadata.category.clone());
                topics
            })
            .collect();

        let session = self
            .store
            .insert_if_absent(Session::restored(session_id, turns, topics));
        if fetched > 0 {
            METRICS.inc_sessions_restored();
            obs::emit_session_restored(
                session_id,
                session.len(),
                skipped,
                summarized,
                session.token_estimate(),
            );
        }
        Ok(session)
    }

    /// End of the span covered by the newest summary of `session_id`.
    async fn summarized_until(&self, session_id: &str) -> MemoryResult<Option<DateTime<Utc>>> {
        let records = ledger_call(
            "get_recent",
            self.ledger_timeout,
            self.ledger.get_recent(&summary_session_id(session_id), 1),
        )
        .await?;
        Ok(records
            .into_iter()
            .next()
            .and_then(|record| match Summary::try_from(record) {
                Ok(summary) => Some(summary.end_time),
                Err(err) => {
                    obs::emit_record_skipped(session_id, &err);
                    None
                }
            }))
    }
}
