//! Recall Ledger: durable conversation storage
//!
//! This crate defines the [`Ledger`] boundary the memory core depends on and
//! ships two implementations of it.
//!
//! ## Key Components
//!
//! - `Ledger`: async trait for storing turns, searching, and fetching the
//!   recent window of a session
//! - `MemoryLedger`: in-memory implementation for tests and embedding
//! - `SurrealLedger`: SurrealDB-backed implementation

mod error;
pub mod fakes;
pub mod ledger_traits;
pub mod surreal_ledger;

pub use error::LedgerError;
pub use fakes::MemoryLedger;
pub use ledger_traits::{
    keyword_score, rank_records, Ledger, LedgerRecord, LedgerResult, NewTurn, RecordKind,
    SearchHit, SearchQuery, TimeRange, TurnId, TurnMetadata, RESERVED_METADATA_KEYS,
};
pub use surreal_ledger::SurrealLedger;
