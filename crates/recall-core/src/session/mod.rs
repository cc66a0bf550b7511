//! Hot session state.
//!
//! A [`Session`] is the bounded, in-memory working set of one conversation.
//! Sessions live in a [`SessionStore`] owned by whoever builds the memory
//! manager; the [`SessionTracker`] is the only writer of new turns.

pub mod store;
pub mod tracker;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use recall_ledger::{LedgerRecord, TurnId, TurnMetadata};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::tokens::estimate_turn_tokens;

pub use store::SessionStore;
pub use tracker::{SessionTracker, TurnReceipt};

/// One user/assistant exchange as held in hot state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub session_id: String,
    pub user_message: String,
    pub assistant_response: String,
    pub timestamp: DateTime<Utc>,
    pub urls: BTreeSet<String>,
    pub metadata: TurnMetadata,
    /// Word-based estimate of this exchange, fixed at creation.
    pub token_estimate: f64,
}

impl Turn {
    /// Same exchange as `other`, by id or by content.
    pub fn same_exchange(&self, id: &TurnId, message: &str, response: &str) -> bool {
        &self.id == id || (self.user_message == message && self.assistant_response == response)
    }
}

impl TryFrom<LedgerRecord> for Turn {
    type Error = MemoryError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| MemoryError::MalformedSessionState {
            record_id: record.id.0.clone(),
            reason: reason.to_string(),
        };
        if record.metadata.is_summary() {
            return Err(malformed("summary records are not turns"));
        }
        let timestamp = record.timestamp.ok_or_else(|| malformed("missing timestamp"))?;
        let user_message = record
            .message
            .clone()
            .ok_or_else(|| malformed("missing user message"))?;
        let assistant_response = record
            .response
            .clone()
            .ok_or_else(|| malformed("missing assistant response"))?;

        let token_estimate = estimate_turn_tokens(&user_message, &assistant_response);
        Ok(Turn {
            id: record.id,
            session_id: record.session_id,
            user_message,
            assistant_response,
            timestamp,
            urls: record.urls.into_iter().collect(),
            metadata: record.metadata,
            token_estimate,
        })
    }
}

/// Hot state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    session_id: String,
    turns: Vec<Turn>,
    token_estimate: f64,
    last_activity: DateTime<Utc>,
    urls: BTreeSet<String>,
    topics: BTreeSet<String>,
}

impl Session {
    /// Empty hot state for a session with no history.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turns: Vec::new(),
            token_estimate: 0.0,
            last_activity: Utc::now(),
            urls: BTreeSet::new(),
            topics: BTreeSet::new(),
        }
    }

    /// Hot state rebuilt from ledger turns (oldest first), re-summing estimates.
    pub fn restored(
        session_id: impl Into<String>,
        turns: Vec<Turn>,
        topics: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut session = Self::new(session_id);
        session.token_estimate = turns.iter().map(|t| t.token_estimate).sum();
        if let Some(last) = turns.last() {
            session.last_activity = last.timestamp;
        }
        session.urls = turns.iter().flat_map(|t| t.urls.iter().cloned()).collect();
        session.topics = topics.into_iter().collect();
        session.turns = turns;
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Hot turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn token_estimate(&self) -> f64 {
        self.token_estimate
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn urls(&self) -> &BTreeSet<String> {
        &self.urls
    }

    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The newest `n` turns, oldest of the window first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Append a turn and fold it into the aggregates.
    pub(crate) fn push_turn(&mut self, turn: Turn, topics: impl IntoIterator<Item = String>) {
        self.token_estimate += turn.token_estimate;
        self.last_activity = turn.timestamp;
        self.urls.extend(turn.urls.iter().cloned());
        self.topics.extend(topics);
        self.turns.push(turn);
    }

    /// Drop the oldest turns if they are exactly `ids`, then scale the estimate.
    ///
    /// Returns `false` (leaving state untouched) when the current prefix no
    /// longer matches.
    pub(crate) fn evict_prefix(&mut self, ids: &[TurnId], ratio: f64) -> bool {
        if ids.is_empty() || ids.len() > self.turns.len() {
            return false;
        }
        if !self.turns.iter().zip(ids).all(|(turn, id)| &turn.id == id) {
            return false;
        }
        self.turns.drain(..ids.len());
        self.token_estimate *= ratio;
        true
    }
}
