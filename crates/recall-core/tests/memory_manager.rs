//! End-to-end behavior of the memory manager over in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use recall_core::metrics::METRICS;
use recall_core::summarizer::fakes::{FailingSummarizer, SlowSummarizer, StaticSummarizer};
use recall_core::{
    CompactionOutcome, ContextPath, MemoryConfig, MemoryError, MemoryManager, Summary,
};
use recall_ledger::{
    Ledger, LedgerError, LedgerRecord, LedgerResult, MemoryLedger, NewTurn, SearchHit,
    SearchQuery, TimeRange, TurnId, TurnMetadata,
};

fn filler(n: usize) -> String {
    vec!["lorem"; n].join(" ")
}

/// 20-word message, 10-word response: 39 estimated tokens per turn.
fn exchange(n: usize) -> (String, String) {
    (format!("turn {n} {}", filler(18)), filler(10))
}

fn compacting_config() -> MemoryConfig {
    MemoryConfig::default()
        .with_summarization_threshold(200.0)
        .with_minimum_batch(5)
}

fn manager(ledger: Arc<dyn Ledger>, config: MemoryConfig) -> MemoryManager {
    MemoryManager::new(ledger, Arc::new(StaticSummarizer::new("Summary about lorem")), config)
        .unwrap()
}

async fn add(mgr: &MemoryManager, session: &str, message: &str, response: &str) -> TurnId {
    mgr.add_turn(session, message, response, Vec::new(), TurnMetadata::default())
        .await
        .unwrap()
}

async fn add_numbered(mgr: &MemoryManager, session: &str, n: usize) -> CompactionOutcome {
    let (message, response) = exchange(n);
    mgr.record_turn(session, &message, &response, Vec::new(), TurnMetadata::default())
        .await
        .unwrap()
        .compaction
}

/// Five short exchanges; the last one is about the quadratic discriminant.
async fn seed_topics(mgr: &MemoryManager, session: &str) {
    add(mgr, session, "how do I solve a quadratic equation", "use the quadratic formula").await;
    add(mgr, session, "what is the capital of france", "paris").await;
    add(mgr, session, "recommend a pasta recipe", "try carbonara").await;
    add(mgr, session, "tell me about jupiter", "largest planet").await;
    add(mgr, session, "explain quadratic discriminant again", "b squared minus four a c").await;
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sixth_turn_crosses_threshold_and_compacts_half() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = manager(ledger.clone(), compacting_config());

    for n in 0..5 {
        assert_eq!(add_numbered(&mgr, "s1", n).await, CompactionOutcome::NotNeeded);
    }
    let session = mgr.session("s1").await.unwrap();
    assert_eq!(session.len(), 5);
    assert!((session.token_estimate() - 195.0).abs() < 1e-9);

    let outcome = add_numbered(&mgr, "s1", 5).await;
    let summary = outcome.summary().cloned().expect("sixth turn compacts");
    assert_eq!(summary.covered_turn_count, 3);
    assert_eq!(summary.session_id, "s1");

    let session = mgr.session("s1").await.unwrap();
    assert_eq!(session.len(), 3);
    assert!(session.turns()[0].user_message.starts_with("turn 3 "));
    assert!((session.token_estimate() - 117.0).abs() < 1e-9);

    let summaries = ledger.records_for("s1_summary");
    assert_eq!(summaries.len(), 1);
    let stored: Summary =
        serde_json::from_str(summaries[0].response.as_deref().unwrap()).unwrap();
    assert_eq!(stored.covered_turn_count, 3);
    assert!((stored.original_token_estimate - 117.0).abs() < 1e-9);
    assert!(METRICS.compactions() >= 1);
}

#[tokio::test]
async fn unseen_session_has_empty_context() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = manager(ledger, MemoryConfig::default());

    assert_eq!(mgr.get_context("fresh", 1000).await.unwrap(), "");
    assert!(mgr.store().contains("fresh"));
    assert!(mgr.session("fresh").await.unwrap().is_empty());
}

#[tokio::test]
async fn search_respects_time_range() {
    let ledger = Arc::new(MemoryLedger::new());
    let jan = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let feb = Utc.with_ymd_and_hms(2024, 2, 15, 10, 0, 0).unwrap();
    ledger
        .store_turn(NewTurn::new("s1", "rust borrow checker", "lifetimes", jan))
        .await
        .unwrap();
    ledger
        .store_turn(NewTurn::new("s1", "rust async traits", "pinning", feb))
        .await
        .unwrap();
    let mgr = manager(ledger, MemoryConfig::default());

    let january = TimeRange::parse_relative("2024-01-15", Utc::now()).unwrap();
    let hits = mgr
        .search("rust", Some("s1"), Some(january), Vec::new(), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message, "rust borrow checker");
    assert!(hits.iter().all(|h| january.contains(h.timestamp)));

    let all = mgr.search("rust", Some("s1"), None, Vec::new(), 10).await.unwrap();
    assert_eq!(all.len(), 2);
    let other = mgr.search("rust", Some("s2"), None, Vec::new(), 10).await.unwrap();
    assert!(other.is_empty());
}

// ---------------------------------------------------------------------------
// Hot state and restoration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_estimate_is_sum_of_turn_estimates() {
    let mgr = manager(Arc::new(MemoryLedger::new()), MemoryConfig::default());
    add(&mgr, "s1", "one two three", "four five").await;
    add(&mgr, "s1", "six", "seven eight nine ten").await;

    let session = mgr.session("s1").await.unwrap();
    let summed: f64 = session.turns().iter().map(|t| t.token_estimate).sum();
    assert!((session.token_estimate() - summed).abs() < 1e-9);
    assert!((session.token_estimate() - 13.0).abs() < 1e-9);
}

#[tokio::test]
async fn turn_urls_and_category_reach_hot_state() {
    let mgr = manager(Arc::new(MemoryLedger::new()), MemoryConfig::default());
    mgr.add_turn(
        "s1",
        "tell me about Tokio",
        "an async runtime",
        vec!["https://tokio.rs".to_string()],
        TurnMetadata::default().with_category("runtimes"),
    )
    .await
    .unwrap();

    let session = mgr.session("s1").await.unwrap();
    assert!(session.urls().contains("https://tokio.rs"));
    assert!(session.topics().contains("runtimes"));
    assert!(session.topics().contains("Tokio"));
}

#[tokio::test]
async fn restoration_is_idempotent() {
    let ledger = Arc::new(MemoryLedger::new());
    for n in 0..3 {
        let (message, response) = exchange(n);
        ledger
            .store_turn(NewTurn::new("s1", message, response, Utc::now()))
            .await
            .unwrap();
    }
    let mgr = manager(ledger.clone(), MemoryConfig::default());

    let first = mgr.session("s1").await.unwrap();
    let second = mgr.session("s1").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!((first.token_estimate() - 117.0).abs() < 1e-9);
    // One read for the turn window, one for the newest summary.
    assert_eq!(ledger.recent_calls(), 2);
}

#[tokio::test]
async fn restoration_is_bounded_to_newest_window() {
    let ledger = Arc::new(MemoryLedger::new());
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    for n in 0..25 {
        let ts = base + chrono::Duration::minutes(n as i64);
        ledger
            .store_turn(NewTurn::new("s1", format!("message {n}"), "ok", ts))
            .await
            .unwrap();
    }
    let mgr = manager(ledger, MemoryConfig::default());

    let session = mgr.session("s1").await.unwrap();
    assert_eq!(session.len(), 20);
    assert_eq!(session.turns()[0].user_message, "message 5");
    assert_eq!(session.last_turn().unwrap().user_message, "message 24");
    assert_eq!(session.last_activity(), base + chrono::Duration::minutes(24));
}

#[tokio::test]
async fn malformed_records_are_skipped_on_restore() {
    let ledger = Arc::new(MemoryLedger::new());
    ledger
        .store_turn(NewTurn::new("s1", "good one", "fine", Utc::now()))
        .await
        .unwrap();
    ledger.insert_raw(LedgerRecord {
        id: TurnId::new(),
        session_id: "s1".to_string(),
        message: Some("no timestamp".to_string()),
        response: Some("lost".to_string()),
        timestamp: None,
        urls: Vec::new(),
        metadata: TurnMetadata::default(),
    });
    ledger.insert_raw(LedgerRecord {
        id: TurnId::new(),
        session_id: "s1".to_string(),
        message: None,
        response: Some("orphan".to_string()),
        timestamp: Some(Utc::now()),
        urls: Vec::new(),
        metadata: TurnMetadata::default(),
    });
    let mgr = manager(ledger, MemoryConfig::default());

    let session = mgr.session("s1").await.unwrap();
    assert_eq!(session.len(), 1);
    assert_eq!(session.turns()[0].user_message, "good one");
    assert!(METRICS.records_skipped() >= 2);
}

#[tokio::test]
async fn history_survives_a_restart() {
    let ledger = Arc::new(MemoryLedger::new());
    {
        let mgr = manager(ledger.clone(), MemoryConfig::default());
        add(&mgr, "s1", "remember the launch code", "it is 42").await;
        add(&mgr, "s1", "and the backup", "it is 7").await;
    }

    let restarted = manager(ledger, MemoryConfig::default());
    let context = restarted.get_context("s1", 1000).await.unwrap();
    assert_eq!(
        context,
        "User: remember the launch code\n\nAssistant: it is 42\n\n\
         User: and the backup\n\nAssistant: it is 7"
    );

    let history = restarted.session_history("s1", 1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_message, "and the backup");
}

#[tokio::test]
async fn summary_records_are_not_restored_as_turns() {
    let ledger = Arc::new(MemoryLedger::new());
    {
        let mgr = manager(ledger.clone(), compacting_config());
        for n in 0..6 {
            add_numbered(&mgr, "s1", n).await;
        }
    }
    let restarted = manager(ledger, compacting_config());
    let summaries = restarted.session("s1_summary").await.unwrap();
    assert!(summaries.is_empty());

    let session = restarted.session("s1").await.unwrap();
    assert_eq!(session.len(), 3);
    assert!(session.turns()[0].user_message.starts_with("turn 3 "));
    assert!((session.token_estimate() - 117.0).abs() < 1e-9);
}

#[tokio::test]
async fn restart_does_not_resummarize_evicted_turns() {
    let ledger = Arc::new(MemoryLedger::new());
    {
        let mgr = manager(ledger.clone(), compacting_config());
        for n in 0..6 {
            add_numbered(&mgr, "s1", n).await;
        }
    }
    let first: Summary = serde_json::from_str(
        ledger.records_for("s1_summary")[0].response.as_deref().unwrap(),
    )
    .unwrap();

    let restarted = manager(ledger.clone(), compacting_config());
    // 4 hot turns, 156 tokens: still under the threshold.
    assert_eq!(add_numbered(&restarted, "s1", 6).await, CompactionOutcome::NotNeeded);
    assert_eq!(ledger.records_for("s1_summary").len(), 1);

    add_numbered(&restarted, "s1", 7).await;
    let second = add_numbered(&restarted, "s1", 8).await;
    let second = second.summary().cloned().expect("sixth hot turn compacts");
    assert!(second.start_time > first.end_time);
    assert_eq!(second.covered_turn_count, 3);
    assert_eq!(ledger.records_for("s1_summary").len(), 2);

    let session = restarted.session("s1").await.unwrap();
    assert!(session.turns()[0].user_message.starts_with("turn 6 "));
}

#[tokio::test]
async fn unreadable_summary_restores_the_full_window() {
    let ledger = Arc::new(MemoryLedger::new());
    for n in 0..2 {
        let (message, response) = exchange(n);
        ledger
            .store_turn(NewTurn::new("s1", message, response, Utc::now()))
            .await
            .unwrap();
    }
    ledger
        .store_turn(
            NewTurn::new("s1_summary", "CONVERSATION_SUMMARY", "not json", Utc::now())
                .with_metadata(TurnMetadata::summary_of("s1")),
        )
        .await
        .unwrap();
    let mgr = manager(ledger, MemoryConfig::default());

    assert_eq!(mgr.session("s1").await.unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Durability and failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn compacted_turns_stay_searchable() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = manager(ledger.clone(), compacting_config());
    for n in 0..6 {
        add_numbered(&mgr, "s1", n).await;
    }
    assert_eq!(mgr.session("s1").await.unwrap().len(), 3);
    assert_eq!(ledger.records_for("s1").len(), 6);

    let hits = mgr.search("turn 0", Some("s1"), None, Vec::new(), 10).await.unwrap();
    assert!(hits[0].message.starts_with("turn 0 "));
}

#[tokio::test]
async fn summarizer_failure_does_not_fail_the_turn() {
    let ledger = Arc::new(MemoryLedger::new());
    let summarizer = Arc::new(FailingSummarizer::new());
    let mgr = MemoryManager::new(ledger.clone(), summarizer.clone(), compacting_config()).unwrap();

    for n in 0..5 {
        add_numbered(&mgr, "s1", n).await;
    }
    let outcome = add_numbered(&mgr, "s1", 5).await;
    assert!(matches!(outcome, CompactionOutcome::Aborted { .. }));
    assert_eq!(summarizer.calls(), 1);

    let session = mgr.session("s1").await.unwrap();
    assert_eq!(session.len(), 6);
    assert!((session.token_estimate() - 234.0).abs() < 1e-9);
    assert!(ledger.records_for("s1_summary").is_empty());
    assert!(METRICS.compaction_failures() >= 1);

    // Every later turn retries while the session stays over budget.
    add_numbered(&mgr, "s1", 6).await;
    assert_eq!(summarizer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_summarizer_times_out_without_mutation() {
    let ledger = Arc::new(MemoryLedger::new());
    let config = compacting_config().with_summarizer_timeout(Duration::from_secs(1));
    let summarizer = Arc::new(SlowSummarizer::new(Duration::from_secs(120), "late"));
    let mgr = MemoryManager::new(ledger.clone(), summarizer, config).unwrap();

    for n in 0..5 {
        add_numbered(&mgr, "s1", n).await;
    }
    match add_numbered(&mgr, "s1", 5).await {
        CompactionOutcome::Aborted { reason } => assert!(reason.contains("timed out")),
        other => panic!("expected timeout abort, got {other:?}"),
    }
    assert_eq!(mgr.session("s1").await.unwrap().len(), 6);
    assert!(ledger.records_for("s1_summary").is_empty());
}

#[tokio::test]
async fn ledger_outage_fails_the_turn_without_mutation() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = manager(ledger.clone(), MemoryConfig::default());
    add(&mgr, "s1", "first", "one").await;
    let before = mgr.session("s1").await.unwrap();

    ledger.set_available(false);
    let err = mgr
        .add_turn("s1", "second", "two", Vec::new(), TurnMetadata::default())
        .await
        .unwrap_err();
    match err {
        MemoryError::LedgerUnavailable { operation, .. } => assert_eq!(operation, "store_turn"),
        other => panic!("expected LedgerUnavailable, got {other:?}"),
    }
    assert_eq!(mgr.session("s1").await.unwrap(), before);
}

#[tokio::test]
async fn restore_failure_caches_nothing() {
    let ledger = Arc::new(MemoryLedger::new());
    ledger.set_available(false);
    let mgr = manager(ledger.clone(), MemoryConfig::default());

    let err = mgr.get_context("s1", 100).await.unwrap_err();
    assert!(matches!(
        err,
        MemoryError::LedgerUnavailable { operation: "get_recent", .. }
    ));
    assert!(!mgr.store().contains("s1"));

    ledger.set_available(true);
    assert_eq!(mgr.get_context("s1", 100).await.unwrap(), "");
}

struct StallingLedger {
    inner: MemoryLedger,
}

#[async_trait]
impl Ledger for StallingLedger {
    async fn store_turn(&self, _turn: NewTurn) -> LedgerResult<TurnId> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(LedgerError::Unavailable("never answered".to_string()))
    }

    async fn search(&self, query: &SearchQuery) -> LedgerResult<Vec<SearchHit>> {
        self.inner.search(query).await
    }

    async fn get_recent(&self, session_id: &str, limit: usize) -> LedgerResult<Vec<LedgerRecord>> {
        self.inner.get_recent(session_id, limit).await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_ledger_write_times_out() {
    let ledger = Arc::new(StallingLedger {
        inner: MemoryLedger::new(),
    });
    let config = MemoryConfig::default().with_ledger_timeout(Duration::from_millis(500));
    let mgr = manager(ledger, config);

    let err = mgr
        .add_turn("s1", "hello", "hi", Vec::new(), TurnMetadata::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out after 500ms"));
    assert!(mgr.session("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_metadata_is_rejected_before_any_write() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = manager(ledger.clone(), MemoryConfig::default());

    let metadata = TurnMetadata::default().with_extra("type", serde_json::json!("summary"));
    let err = mgr
        .add_turn("s1", "hi", "hello", Vec::new(), metadata)
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::InvalidMetadata(_)));
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = MemoryConfig::default().with_compression_ratio(0.0);
    let result = MemoryManager::new(
        Arc::new(MemoryLedger::new()),
        Arc::new(StaticSummarizer::new("x")),
        config,
    );
    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
}

// ---------------------------------------------------------------------------
// Context assembly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cheap_path_returns_recent_window_only() {
    let mgr = manager(Arc::new(MemoryLedger::new()), MemoryConfig::default());
    for n in 0..12 {
        add(&mgr, "s1", &format!("question {n}"), &format!("answer {n}")).await;
    }

    let assembled = mgr.assemble_context("s1", 4000).await.unwrap();
    assert_eq!(assembled.path, ContextPath::Recent);
    assert_eq!(assembled.turns_used, 10);
    assert!(!assembled.text.contains("question 1\n"));
    assert!(assembled.text.starts_with("User: question 2\n\nAssistant: answer 2"));
    assert!(assembled.text.ends_with("User: question 11\n\nAssistant: answer 11"));
}

#[tokio::test]
async fn over_budget_blends_fragments_before_recent_turns() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = manager(ledger, MemoryConfig::default());
    seed_topics(&mgr, "s1").await;

    let assembled = mgr.assemble_context("s1", 10).await.unwrap();
    assert_eq!(assembled.path, ContextPath::Retrieval);
    assert_eq!(assembled.fragments_used, 1);
    assert_eq!(assembled.turns_used, 3);
    assert_eq!(
        assembled.text,
        "[Earlier] User: how do I solve a quadratic equation\n\n\
         [Earlier] Assistant: use the quadratic formula\n\n\
         [Current] User: recommend a pasta recipe\n\n\
         [Current] Assistant: try carbonara\n\n\
         [Current] User: tell me about jupiter\n\n\
         [Current] Assistant: largest planet\n\n\
         [Current] User: explain quadratic discriminant again\n\n\
         [Current] Assistant: b squared minus four a c"
    );
}

#[tokio::test]
async fn no_fragments_falls_back_to_budgeted_tail() {
    let mgr = manager(Arc::new(MemoryLedger::new()), MemoryConfig::default());
    seed_topics(&mgr, "s1").await;
    add(&mgr, "s1", "zebra stripes", "camouflage").await;

    let assembled = mgr.assemble_context("s1", 10).await.unwrap();
    assert_eq!(assembled.path, ContextPath::Fallback);
    assert_eq!(assembled.text, "User: zebra stripes\n\nAssistant: camouflage");
}

struct SearchOutageLedger {
    inner: MemoryLedger,
}

#[async_trait]
impl Ledger for SearchOutageLedger {
    async fn store_turn(&self, turn: NewTurn) -> LedgerResult<TurnId> {
        self.inner.store_turn(turn).await
    }

    async fn search(&self, _query: &SearchQuery) -> LedgerResult<Vec<SearchHit>> {
        Err(LedgerError::Unavailable("index rebuilding".to_string()))
    }

    async fn get_recent(&self, session_id: &str, limit: usize) -> LedgerResult<Vec<LedgerRecord>> {
        self.inner.get_recent(session_id, limit).await
    }
}

#[tokio::test]
async fn search_failure_degrades_to_budgeted_tail() {
    let ledger = Arc::new(SearchOutageLedger {
        inner: MemoryLedger::new(),
    });
    let mgr = manager(ledger, MemoryConfig::default());
    seed_topics(&mgr, "s1").await;

    let assembled = mgr.assemble_context("s1", 25).await.unwrap();
    assert_eq!(assembled.path, ContextPath::Fallback);
    assert_eq!(assembled.turns_used, 2);
    assert_eq!(
        assembled.text,
        "User: tell me about jupiter\n\nAssistant: largest planet\n\n\
         User: explain quadratic discriminant again\n\nAssistant: b squared minus four a c"
    );
    assert!(METRICS.context_fallbacks() >= 1);

    let err = mgr.search("quadratic", None, None, Vec::new(), 5).await.unwrap_err();
    assert!(matches!(err, MemoryError::LedgerUnavailable { operation: "search", .. }));
}

// ---------------------------------------------------------------------------
// Agent-facing helpers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn build_prompt_wraps_context() {
    let mgr = manager(Arc::new(MemoryLedger::new()), MemoryConfig::default());
    assert_eq!(mgr.build_prompt("s1", "hello").await.unwrap(), "hello");

    add(&mgr, "s1", "my name is Ada", "nice to meet you").await;
    assert_eq!(
        mgr.build_prompt("s1", "what is my name").await.unwrap(),
        "Previous conversation context:\n\
         User: my name is Ada\n\nAssistant: nice to meet you\n\n\
         Current message: what is my name"
    );
}

#[tokio::test]
async fn search_history_formats_hits() {
    let ledger = Arc::new(MemoryLedger::new());
    let ts = Utc.with_ymd_and_hms(2024, 1, 15, 9, 5, 0).unwrap();
    ledger
        .store_turn(NewTurn::new("s1", "quadratic roots", "two of them", ts))
        .await
        .unwrap();
    let mgr = manager(ledger, MemoryConfig::default());

    let found = mgr
        .search_history("quadratic roots", Some("2024-01-15"), Some("s1"))
        .await
        .unwrap();
    assert_eq!(
        found,
        "[2024-01-15 09:05] (Score: 1.00)\nUser: quadratic roots\nAssistant: two of them..."
    );

    let missed = mgr
        .search_history("quadratic", Some("2023-06-01"), None)
        .await
        .unwrap();
    assert_eq!(missed, "No relevant conversation history found.");

    // Unknown range specs search everything.
    let unfiltered = mgr.search_history("quadratic", Some("someday"), None).await.unwrap();
    assert!(unfiltered.starts_with("[2024-01-15 09:05]"));
}

#[tokio::test]
async fn search_by_url_filters_on_url() {
    let mgr = manager(Arc::new(MemoryLedger::new()), MemoryConfig::default());
    mgr.add_turn(
        "s1",
        "summarize this article",
        "it covers ownership",
        vec!["https://doc.rust-lang.org/book".to_string()],
        TurnMetadata::default(),
    )
    .await
    .unwrap();
    add(&mgr, "s1", "unrelated", "chatter").await;

    let found = mgr.search_by_url("https://doc.rust-lang.org/book").await.unwrap();
    assert!(found.contains("URLs: https://doc.rust-lang.org/book\nContext: summarize this article..."));
    assert!(!found.contains("unrelated"));

    let missing = mgr.search_by_url("https://example.org").await.unwrap();
    assert_eq!(
        missing,
        "No conversations found involving URLs matching 'https://example.org'."
    );
}

#[tokio::test]
async fn sessions_progress_independently() {
    let ledger = Arc::new(MemoryLedger::new());
    let mgr = Arc::new(manager(ledger.clone(), MemoryConfig::default()));

    let a = {
        let mgr = mgr.clone();
        tokio::spawn(async move {
            for n in 0..10 {
                add(&mgr, "a", &format!("a{n}"), "ok").await;
            }
        })
    };
    let b = {
        let mgr = mgr.clone();
        tokio::spawn(async move {
            for n in 0..10 {
                add(&mgr, "b", &format!("b{n}"), "ok").await;
            }
        })
    };
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(mgr.session("a").await.unwrap().len(), 10);
    assert_eq!(mgr.session("b").await.unwrap().len(), 10);
    assert_eq!(ledger.len(), 20);
    assert_eq!(mgr.store().session_ids(), vec!["a", "b"]);
}
