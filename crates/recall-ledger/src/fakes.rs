//! In-memory ledger (testing and embedded use)
//!
//! `MemoryLedger` satisfies the [`Ledger`] contract without any external
//! dependencies. It also lets tests simulate outages and inject partial
//! records that a real backend might hand back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::ledger_traits::*;

/// In-memory ledger backed by an append-only `Vec<LedgerRecord>`.
#[derive(Debug)]
pub struct MemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
    available: AtomicBool,
    store_calls: AtomicU64,
    search_calls: AtomicU64,
    recent_calls: AtomicU64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            store_calls: AtomicU64::new(0),
            search_calls: AtomicU64::new(0),
            recent_calls: AtomicU64::new(0),
        }
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<LedgerRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("memory ledger is offline".to_string()))
        }
    }

    /// Toggle a simulated outage. While offline every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Append a record verbatim, bypassing `store_turn` (partial rows included).
    pub fn insert_raw(&self, record: LedgerRecord) {
        self.records().push(record);
    }

    /// Every record stored under `session_id`, in insertion order.
    pub fn records_for(&self, session_id: &str) -> Vec<LedgerRecord> {
        self.records()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn store_calls(&self) -> u64 {
        self.store_calls.load(Ordering::Relaxed)
    }

    pub fn search_calls(&self) -> u64 {
        self.search_calls.load(Ordering::Relaxed)
    }

    pub fn recent_calls(&self) -> u64 {
        self.recent_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn store_turn(&self, turn: NewTurn) -> LedgerResult<TurnId> {
        self.store_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        if turn.session_id.is_empty() {
            return Err(LedgerError::InvalidRecord(
                "session_id must not be empty".to_string(),
            ));
        }
        let id = TurnId::new();
        self.records().push(turn.into_record(id.clone()));
        Ok(id)
    }

    async fn search(&self, query: &SearchQuery) -> LedgerResult<Vec<SearchHit>> {
        self.search_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let records = self.records();
        Ok(rank_records(records.iter(), query))
    }

    async fn get_recent(&self, session_id: &str, limit: usize) -> LedgerResult<Vec<LedgerRecord>> {
        self.recent_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let mut rows: Vec<LedgerRecord> = self
            .records()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        rows.sort_by_key(|r| r.timestamp);
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.split_off(skip))
    }
}
