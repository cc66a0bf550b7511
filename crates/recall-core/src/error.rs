//! Error taxonomy for the memory core.

use recall_ledger::{LedgerError, LedgerResult};

/// Errors produced by memory operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The durable store could not be reached or written in time.
    #[error("ledger unavailable during {operation}: {reason}")]
    LedgerUnavailable {
        operation: &'static str,
        reason: String,
    },

    #[error("summarization failed: {0}")]
    SummarizationFailure(String),

    #[error("malformed ledger record {record_id}: {reason}")]
    MalformedSessionState { record_id: String, reason: String },

    /// Hot state changed underneath an in-flight compaction.
    #[error("session {session_id} changed while compaction was in flight")]
    CompactionConflict { session_id: String },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    pub(crate) fn ledger(operation: &'static str, err: LedgerError) -> Self {
        MemoryError::LedgerUnavailable {
            operation,
            reason: err.to_string(),
        }
    }

    pub(crate) fn ledger_timeout(operation: &'static str, after: std::time::Duration) -> Self {
        MemoryError::LedgerUnavailable {
            operation,
            reason: format!("timed out after {}ms", after.as_millis()),
        }
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

/// Await a ledger call under `limit`, mapping failure and timeout alike
/// to [`MemoryError::LedgerUnavailable`].
pub(crate) async fn ledger_call<T, F>(
    operation: &'static str,
    limit: std::time::Duration,
    call: F,
) -> MemoryResult<T>
where
    F: std::future::Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(MemoryError::ledger(operation, err)),
        Err(_) => Err(MemoryError::ledger_timeout(operation, limit)),
    }
}
