//! Context assembly for the next model call.
//!
//! Small sessions are returned verbatim from hot state. Sessions over the
//! budget blend relevant historical fragments from the ledger with the
//! newest turns; if retrieval fails or finds nothing, the newest turns that
//! fit the budget are returned instead.

use std::sync::Arc;
use std::time::Duration;

use recall_ledger::{Ledger, SearchHit, SearchQuery};
use tracing::Instrument;

use crate::config::MemoryConfig;
use crate::error::{ledger_call, MemoryResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::session::{Session, SessionTracker, Turn};

/// Which strategy produced a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPath {
    /// No turns in the session.
    Empty,
    /// Under budget: the recent tail, verbatim.
    Recent,
    /// Over budget: retrieved fragments plus the verbatim tail.
    Retrieval,
    /// Retrieval unavailable or empty: newest turns that fit the budget.
    Fallback,
}

impl ContextPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextPath::Empty => "empty",
            ContextPath::Recent => "recent",
            ContextPath::Retrieval => "retrieval",
            ContextPath::Fallback => "fallback",
        }
    }
}

/// Assembled context plus how it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub path: ContextPath,
    pub text: String,
    /// Hot turns rendered verbatim.
    pub turns_used: usize,
    /// Ledger fragments rendered as `[Earlier]` blocks.
    pub fragments_used: usize,
}

impl AssembledContext {
    fn empty(path: ContextPath) -> Self {
        Self {
            path,
            text: String::new(),
            turns_used: 0,
            fragments_used: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSettings {
    pub recent_window: usize,
    pub verbatim_recent: usize,
    pub search_limit: usize,
    pub ledger_timeout: Duration,
}

impl From<&MemoryConfig> for ContextSettings {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            recent_window: config.recent_window,
            verbatim_recent: config.verbatim_recent,
            search_limit: config.search_limit,
            ledger_timeout: config.ledger_timeout(),
        }
    }
}

fn render_turns(turns: &[Turn], label: &str, parts: &mut Vec<String>) {
    for turn in turns {
        parts.push(format!("{label}User: {}", turn.user_message));
        parts.push(format!("{label}Assistant: {}", turn.assistant_response));
    }
}

fn render_fragments(hits: &[SearchHit], parts: &mut Vec<String>) {
    for hit in hits {
        parts.push(format!("[Earlier] User: {}", hit.message));
        parts.push(format!("[Earlier] Assistant: {}", hit.response));
    }
}

/// Builds the conversational context handed to the model.
pub struct ContextAssembler {
    tracker: Arc<SessionTracker>,
    ledger: Arc<dyn Ledger>,
    settings: ContextSettings,
}

impl ContextAssembler {
    pub fn new(
        tracker: Arc<SessionTracker>,
        ledger: Arc<dyn Ledger>,
        settings: ContextSettings,
    ) -> Self {
        Self {
            tracker,
            ledger,
            settings,
        }
    }

    /// Context text for `session_id` within roughly `max_tokens`.
    pub async fn get_context(&self, session_id: &str, max_tokens: usize) -> MemoryResult<String> {
        Ok(self.assemble(session_id, max_tokens).await?.text)
    }

    /// Like [`ContextAssembler::get_context`], reporting the path taken.
    pub async fn assemble(
        &self,
        session_id: &str,
        max_tokens: usize,
    ) -> MemoryResult<AssembledContext> {
        self.assemble_for(session_id, max_tokens)
            .instrument(obs::session_span(session_id))
            .await
    }

    async fn assemble_for(
        &self,
        session_id: &str,
        max_tokens: usize,
    ) -> MemoryResult<AssembledContext> {
        let session = self.tracker.get_or_restore(session_id).await?;
        let assembled = self.build(&session, max_tokens).await;
        obs::emit_context_assembled(
            session_id,
            assembled.path.as_str(),
            assembled.turns_used,
            assembled.fragments_used,
        );
        Ok(assembled)
    }

    async fn build(&self, session: &Session, max_tokens: usize) -> AssembledContext {
        if session.is_empty() {
            return AssembledContext::empty(ContextPath::Empty);
        }
        if session.token_estimate() <= max_tokens as f64 {
            return self.recent(session);
        }

        match self.retrieve(session).await {
            Ok(Some(assembled)) => assembled,
            Ok(None) => {
                METRICS.inc_context_fallbacks();
                fallback(session, max_tokens)
            }
            Err(err) => {
                METRICS.inc_context_fallbacks();
                obs::emit_context_degraded(session.session_id(), &err);
                fallback(session, max_tokens)
            }
        }
    }

    fn recent(&self, session: &Session) -> AssembledContext {
        let turns = session.recent(self.settings.recent_window);
        let mut parts = Vec::with_capacity(turns.len() * 2);
        render_turns(turns, "", &mut parts);
        AssembledContext {
            path: ContextPath::Recent,
            text: parts.join("\n\n"),
            turns_used: turns.len(),
            fragments_used: 0,
        }
    }

    /// `Ok(None)` when nothing relevant remains once the newest turn is excluded.
    async fn retrieve(&self, session: &Session) -> MemoryResult<Option<AssembledContext>> {
        let Some(latest) = session.last_turn() else {
            return Ok(None);
        };
        let query = SearchQuery::new(latest.user_message.clone(), self.settings.search_limit)
            .in_session(session.session_id());
        let hits: Vec<SearchHit> = ledger_call(
            "search",
            self.settings.ledger_timeout,
            self.ledger.search(&query),
        )
        .await?
        .into_iter()
        .filter(|hit| !latest.same_exchange(&hit.id, &hit.message, &hit.response))
        .collect();
        if hits.is_empty() {
            return Ok(None);
        }

        let tail = session.recent(self.settings.verbatim_recent);
        let mut parts = Vec::with_capacity((hits.len() + tail.len()) * 2);
        render_fragments(&hits, &mut parts);
        render_turns(tail, "[Current] ", &mut parts);
        Ok(Some(AssembledContext {
            path: ContextPath::Retrieval,
            text: parts.join("\n\n"),
            turns_used: tail.len(),
            fragments_used: hits.len(),
        }))
    }
}

/// Newest turns whose summed estimates fit `max_tokens`, chronological.
fn fallback(session: &Session, max_tokens: usize) -> AssembledContext {
    let budget = max_tokens as f64;
    let mut used = 0.0;
    let mut kept = 0;
    for turn in session.turns().iter().rev() {
        if used + turn.token_estimate > budget {
            break;
        }
        used += turn.token_estimate;
        kept += 1;
    }

    let turns = session.recent(kept);
    let mut parts = Vec::with_capacity(kept * 2);
    render_turns(turns, "", &mut parts);
    AssembledContext {
        path: ContextPath::Fallback,
        text: parts.join("\n\n"),
        turns_used: kept,
        fragments_used: 0,
    }
}
