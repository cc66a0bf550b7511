//! Structured observability hooks for session lifecycle events.
//!
//! This module provides:
//! - Session-scoped tracing spans via the `SessionSpan` RAII guard
//! - Emission functions for turn recording, restoration, compaction and
//!   context assembly
//!
//! Events are emitted at `info!` level; degradations and aborted
//! compactions at `warn!`. Filtering follows `RUST_LOG`.

use tracing::{info, warn};

/// Span tagging every event of one session operation.
///
/// Use with `tracing::Instrument` around async work; [`SessionSpan`] is the
/// synchronous counterpart.
pub fn session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("recall.session", session_id = %session_id)
}

/// RAII guard that enters a session-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = SessionSpan::enter("s1");
/// // every event below carries session_id = "s1"
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    /// Create and enter a span tagged with the session id.
    pub fn enter(session_id: &str) -> Self {
        Self {
            _span: session_span(session_id).entered(),
        }
    }
}

/// Emit event: a turn was durably stored and appended to hot state.
pub fn emit_turn_recorded(session_id: &str, turn_id: &str, turn_tokens: f64, session_tokens: f64) {
    info!(
        event = "turn.recorded",
        session_id = %session_id,
        turn_id = %turn_id,
        turn_tokens = turn_tokens,
        session_tokens = session_tokens,
    );
}

/// Emit event: hot state rebuilt from the ledger.
pub fn emit_session_restored(
    session_id: &str,
    restored: usize,
    skipped: usize,
    summarized: usize,
    tokens: f64,
) {
    info!(
        event = "session.restored",
        session_id = %session_id,
        restored = restored,
        skipped = skipped,
        summarized = summarized,
        tokens = tokens,
    );
}

/// Emit event: a ledger record was unusable during restoration (warning level).
pub fn emit_record_skipped(session_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "session.record_skipped", session_id = %session_id, error = %error);
}

/// Emit event: compaction summarized and evicted a prefix.
pub fn emit_compaction_completed(
    session_id: &str,
    covered_turns: usize,
    tokens_before: f64,
    tokens_after: f64,
) {
    info!(
        event = "compaction.completed",
        session_id = %session_id,
        covered_turns = covered_turns,
        tokens_before = tokens_before,
        tokens_after = tokens_after,
    );
}

/// Emit event: compaction aborted without touching hot state (warning level).
pub fn emit_compaction_aborted(session_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "compaction.aborted", session_id = %session_id, error = %error);
}

/// Emit event: context assembled for a model call.
pub fn emit_context_assembled(session_id: &str, path: &str, turns: usize, fragments: usize) {
    info!(
        event = "context.assembled",
        session_id = %session_id,
        path = %path,
        turns = turns,
        fragments = fragments,
    );
}

/// Emit event: retrieval unavailable, falling back to the recent tail (warning level).
pub fn emit_context_degraded(session_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "context.degraded", session_id = %session_id, error = %error);
}
