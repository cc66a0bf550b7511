//! Ledger trait definitions for recall
//!
//! The ledger is the durable, append-only home of every conversation turn
//! and every compaction summary. The memory core only ever talks to it
//! through the [`Ledger`] trait:
//! - `store_turn`: point write, returns the ledger-assigned id
//! - `search`: relevance-ranked lookup with session/time/url filters
//! - `get_recent`: chronological tail of one session
//!
//! The trait is async and backend-agnostic. An in-memory implementation is
//! provided in the `fakes` module, a SurrealDB one in `surreal_ledger`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Result type for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// Identifiers and metadata
// ---------------------------------------------------------------------------

/// Ledger-assigned identifier of a stored turn
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    /// Generate a new random TurnId
    pub fn new() -> Self {
        TurnId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a ledger record represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A user/assistant exchange.
    #[default]
    Turn,
    /// A compaction summary stored under a derived session id.
    Summary,
}

/// Field names owned by [`TurnMetadata`]; `extra` may not reuse them.
pub const RESERVED_METADATA_KEYS: [&str; 4] = ["type", "event_kind", "category", "original_session"];

/// Typed metadata attached to every ledger record.
///
/// Known fields are validated; anything caller-specific goes in `extra`,
/// which is flattened next to the known fields when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    #[serde(rename = "type", default)]
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Session a summary record was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_session: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TurnMetadata {
    /// Metadata for a summary record covering `session_id`.
    pub fn summary_of(session_id: &str) -> Self {
        Self {
            kind: RecordKind::Summary,
            original_session: Some(session_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_event_kind(mut self, event_kind: impl Into<String>) -> Self {
        self.event_kind = Some(event_kind.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_summary(&self) -> bool {
        self.kind == RecordKind::Summary
    }

    /// Check the known fields and the extension map.
    pub fn validate(&self) -> Result<(), String> {
        let known = [
            ("event_kind", &self.event_kind),
            ("category", &self.category),
            ("original_session", &self.original_session),
        ];
        for (name, value) in known {
            if let Some(v) = value {
                if v.trim().is_empty() {
                    return Err(format!("metadata field `{name}` must not be empty"));
                }
            }
        }
        if let Some(key) = self
            .extra
            .keys()
            .find(|k| RESERVED_METADATA_KEYS.contains(&k.as_str()))
        {
            return Err(format!("extra metadata key `{key}` shadows a known field"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A turn about to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTurn {
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub urls: Vec<String>,
    pub metadata: TurnMetadata,
}

impl NewTurn {
    pub fn new(
        session_id: impl Into<String>,
        message: impl Into<String>,
        response: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            response: response.into(),
            timestamp,
            urls: Vec::new(),
            metadata: TurnMetadata::default(),
        }
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_metadata(mut self, metadata: TurnMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The stored form of this turn once the ledger has assigned `id`.
    pub fn into_record(self, id: TurnId) -> LedgerRecord {
        LedgerRecord {
            id,
            session_id: self.session_id,
            message: Some(self.message),
            response: Some(self.response),
            timestamp: Some(self.timestamp),
            urls: self.urls,
            metadata: self.metadata,
        }
    }
}

/// A record as read back from the ledger.
///
/// Content fields are optional: backends return whatever they hold, and
/// rows written by older or foreign producers may be incomplete. Callers
/// decide what to do with partial records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: TurnId,
    pub session_id: String,
    pub message: Option<String>,
    pub response: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub metadata: TurnMetadata,
}

impl LedgerRecord {
    /// Project a complete record into a search hit. Partial records yield `None`.
    pub fn to_hit(&self, score: f64) -> Option<SearchHit> {
        Some(SearchHit {
            id: self.id.clone(),
            score,
            message: self.message.clone()?,
            response: self.response.clone()?,
            timestamp: self.timestamp?,
            urls: self.urls.clone(),
            metadata: self.metadata.clone(),
        })
    }

    /// Text used for relevance scoring.
    pub fn searchable_text(&self) -> String {
        let mut text = format!(
            "User: {}\nAssistant: {}",
            self.message.as_deref().unwrap_or_default(),
            self.response.as_deref().unwrap_or_default()
        );
        if !self.urls.is_empty() {
            text.push_str("\nURLs: ");
            text.push_str(&self.urls.join(" "));
        }
        text
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Inclusive time window; open on any side left as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }

    /// Parse `today`, `last_week`, `last_month` or a `YYYY-MM-DD` day,
    /// relative to `now` (UTC). Anything else means no filter.
    pub fn parse_relative(spec: &str, now: DateTime<Utc>) -> Option<Self> {
        let midnight = |day: NaiveDate| day.and_hms_opt(0, 0, 0).map(|t| Utc.from_utc_datetime(&t));
        match spec.trim().to_lowercase().as_str() {
            "today" => midnight(now.date_naive()).map(|start| Self::between(start, now)),
            "last_week" => Some(Self::between(now - Duration::days(7), now)),
            "last_month" => Some(Self::between(now - Duration::days(30), now)),
            other => {
                let day = NaiveDate::parse_from_str(other, "%Y-%m-%d").ok()?;
                let start = midnight(day)?;
                Some(Self::between(start, start + Duration::days(1)))
            }
        }
    }
}

/// Filtered relevance query against the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub session_id: Option<String>,
    pub time_range: Option<TimeRange>,
    /// Every listed URL must appear on a matching record.
    pub urls: Vec<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            time_range: None,
            urls: Vec::new(),
            limit,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn within(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    /// Whether `record` passes every filter (relevance is not considered).
    pub fn admits(&self, record: &LedgerRecord) -> bool {
        if let Some(sid) = &self.session_id {
            if &record.session_id != sid {
                return false;
            }
        }
        if let Some(range) = &self.time_range {
            match record.timestamp {
                Some(ts) if range.contains(ts) => {}
                _ => return false,
            }
        }
        self.urls.iter().all(|u| record.urls.contains(u))
    }
}

/// A relevance-scored record returned by [`Ledger::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: TurnId,
    pub score: f64,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub urls: Vec<String>,
    pub metadata: TurnMetadata,
}

/// Keyword overlap scorer: fraction of query words found in `text`.
///
/// Stands in for embedding similarity in the bundled backends.
pub fn keyword_score(query: &str, text: &str) -> f64 {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let matched = words.iter().filter(|w| haystack.contains(w.as_str())).count();
    matched as f64 / words.len() as f64
}

/// Score, filter and rank `records` for `query`, newest first on ties.
pub fn rank_records<'a, I>(records: I, query: &SearchQuery) -> Vec<SearchHit>
where
    I: IntoIterator<Item = &'a LedgerRecord>,
{
    let mut hits: Vec<SearchHit> = records
        .into_iter()
        .filter(|r| query.admits(r))
        .filter_map(|r| {
            let score = keyword_score(&query.text, &r.searchable_text());
            if score > 0.0 {
                r.to_hit(score)
            } else {
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    hits.truncate(query.limit);
    hits
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Durable conversation ledger.
///
/// Guarantees:
/// - Records are never deleted or rewritten once `store_turn` returns.
/// - `get_recent` returns the newest `limit` records of one session in
///   chronological order (oldest first).
/// - `search` never returns records that fail the query's filters.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Persist a turn and return its id.
    async fn store_turn(&self, turn: NewTurn) -> LedgerResult<TurnId>;

    /// Relevance-ranked search, at most `query.limit` hits.
    async fn search(&self, query: &SearchQuery) -> LedgerResult<Vec<SearchHit>>;

    /// Newest `limit` records of `session_id`, oldest first.
    async fn get_recent(&self, session_id: &str, limit: usize) -> LedgerResult<Vec<LedgerRecord>>;
}
