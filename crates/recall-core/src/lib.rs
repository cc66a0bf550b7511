//! Recall Core: bounded conversational memory for LLM agents
//!
//! Tracks per-session dialogue turns in a token-budgeted hot working set,
//! compacts older turns into summaries when the budget is exceeded,
//! restores sessions from the durable ledger on demand, and assembles the
//! context for the next model call.
//!
//! ## Key Components
//!
//! - `MemoryManager`: facade exposing `add_turn`, `get_context` and `search`
//! - `SessionTracker`: records turns and restores sessions from the ledger
//! - `CompactionPolicy`: summarizes and evicts the oldest half of a session
//! - `ContextAssembler`: recent-tail or retrieval-blend context under a budget
//! - `Summarizer`: pluggable text compression (HTTP client and fakes)

pub mod compaction;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod manager;
pub mod metrics;
pub mod obs;
pub mod session;
pub mod summarizer;
pub mod telemetry;
pub mod tokens;

pub use compaction::topics::{HeuristicTopicExtractor, TopicExtractor};
pub use compaction::{CompactionOutcome, CompactionPolicy, CompactionSettings, Summary};
pub use config::MemoryConfig;
pub use context::{AssembledContext, ContextAssembler, ContextPath, ContextSettings};
pub use error::{MemoryError, MemoryResult};
pub use manager::MemoryManager;
pub use session::{Session, SessionStore, SessionTracker, Turn, TurnReceipt};
pub use summarizer::{ChatCompletionsSummarizer, Summarizer, SummarizerConfig, SummarizerError};
pub use tokens::estimate_tokens;

pub use recall_ledger::{
    Ledger, LedgerError, LedgerRecord, MemoryLedger, NewTurn, SearchHit, SearchQuery,
    SurrealLedger, TimeRange, TurnId, TurnMetadata,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
