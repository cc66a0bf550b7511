//! Error types for recall-ledger

use thiserror::Error;

/// Errors that can occur in the ledger layer
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Database connection error
    #[error("Ledger connection failed: {0}")]
    Connection(String),

    /// Backend query or write error
    #[error("Ledger backend error: {0}")]
    Backend(String),

    /// Backend reachable but refusing work (maintenance, injected outage)
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record handed to the ledger is unusable
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<surrealdb::Error> for LedgerError {
    fn from(err: surrealdb::Error) -> Self {
        LedgerError::Backend(err.to_string())
    }
}
