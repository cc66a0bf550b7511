//! SurrealDB-backed Ledger implementation
//!
//! Turns and summaries live in a single `turns` table. Rows are converted
//! to/from `ledger_traits` types at the boundary. Relevance is keyword
//! overlap computed in-process over the filtered candidate rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::ledger_traits::{
    rank_records, Ledger, LedgerRecord, LedgerResult, NewTurn, SearchHit, SearchQuery, TurnId,
    TurnMetadata,
};

const NAMESPACE: &str = "recall";
const DATABASE: &str = "main";
const DEFAULT_LOCAL_PATH: &str = ".recall/db";

const RECENT_QUERY: &str =
    "SELECT * FROM turns WHERE session_id = $sid ORDER BY timestamp DESC LIMIT $limit";

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

/// Row shape of the `turns` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TurnRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    turn_id: String,
    session_id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default, with = "surreal_datetime_opt")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl TurnRow {
    fn from_new(id: &TurnId, turn: NewTurn) -> LedgerResult<Self> {
        Ok(Self {
            id: None,
            turn_id: id.0.clone(),
            session_id: turn.session_id,
            message: Some(turn.message),
            response: Some(turn.response),
            timestamp: Some(turn.timestamp),
            urls: turn.urls,
            metadata: serde_json::to_value(&turn.metadata)?,
        })
    }

    fn into_record(self) -> LedgerRecord {
        let metadata = if self.metadata.is_null() {
            TurnMetadata::default()
        } else {
            serde_json::from_value(self.metadata).unwrap_or_else(|e| {
                warn!(turn_id = %self.turn_id, error = %e, "unreadable metadata, using defaults");
                TurnMetadata::default()
            })
        };
        LedgerRecord {
            id: TurnId(self.turn_id),
            session_id: self.session_id,
            message: self.message,
            response: self.response,
            timestamp: self.timestamp,
            urls: self.urls,
            metadata,
        }
    }
}

/// Initialize the `turns` table and its indexes. Idempotent.
pub async fn init_schema(db: &Surreal<Any>) -> LedgerResult<()> {
    debug!("Initializing turns table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS turns
            SCHEMALESS
            PERMISSIONS
                FOR select, create FULL,
                FOR update, delete NONE;

        -- Ledger ids are unique
        DEFINE INDEX IF NOT EXISTS idx_turn_id ON TABLE turns COLUMNS turn_id UNIQUE;

        -- Session lookups (restoration, scoped search)
        DEFINE INDEX IF NOT EXISTS idx_session_id ON TABLE turns COLUMNS session_id;

        -- Recent-window scans
        DEFINE INDEX IF NOT EXISTS idx_session_timestamp ON TABLE turns COLUMNS session_id, timestamp;
    "#;

    db.query(sql).await?;
    info!("turns table initialized");
    Ok(())
}

/// SurrealDB-backed implementation of [`Ledger`].
pub struct SurrealLedger {
    db: Surreal<Any>,
}

impl SurrealLedger {
    /// Connect to `url`, select `recall/main`, and run `init_schema`.
    pub async fn connect(url: &str) -> LedgerResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;

        init_schema(&db).await?;
        info!("SurrealLedger connected ({})", url);
        Ok(Self { db })
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> LedgerResult<Self> {
        Self::connect("mem://").await
    }

    /// Create from environment variables.
    ///
    /// Uses `SURREALDB_URL` when set (signing in as root when
    /// `SURREALDB_USERNAME`/`SURREALDB_PASSWORD` are present), otherwise
    /// falls back to local persistence in `.recall/db`.
    pub async fn from_env() -> LedgerResult<Self> {
        use surrealdb::opt::auth::Root;

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let db = surrealdb::engine::any::connect(&url)
                .await
                .map_err(|e| LedgerError::Connection(e.to_string()))?;

            if let (Ok(username), Ok(password)) = (
                std::env::var("SURREALDB_USERNAME"),
                std::env::var("SURREALDB_PASSWORD"),
            ) {
                db.signin(Root {
                    username: &username,
                    password: &password,
                })
                .await
                .map_err(|e| LedgerError::Connection(format!("Root auth failed: {e}")))?;
            }

            db.use_ns(NAMESPACE)
                .use_db(DATABASE)
                .await
                .map_err(|e| LedgerError::Connection(e.to_string()))?;

            init_schema(&db).await?;
            info!("SurrealLedger connected ({})", url);
            return Ok(Self { db });
        }

        std::fs::create_dir_all(DEFAULT_LOCAL_PATH).map_err(|e| {
            LedgerError::Connection(format!(
                "Failed to create database directory {}: {}",
                DEFAULT_LOCAL_PATH, e
            ))
        })?;
        let url = format!("surrealkv://{}", DEFAULT_LOCAL_PATH);
        info!("No SURREALDB_URL found, using local persistence: {}", url);
        Self::connect(&url).await
    }

    // -- private helpers -----------------------------------------------------

    async fn rows_for_session(&self, session_id: &str) -> LedgerResult<Vec<TurnRow>> {
        let sid = session_id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM turns WHERE session_id = $sid")
            .bind(("sid", sid))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;

        res.take(0).map_err(|e| LedgerError::Backend(e.to_string()))
    }

    async fn all_rows(&self) -> LedgerResult<Vec<TurnRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM turns")
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;

        res.take(0).map_err(|e| LedgerError::Backend(e.to_string()))
    }
}

#[async_trait]
impl Ledger for SurrealLedger {
    async fn store_turn(&self, turn: NewTurn) -> LedgerResult<TurnId> {
        if turn.session_id.is_empty() {
            return Err(LedgerError::InvalidRecord(
                "session_id must not be empty".to_string(),
            ));
        }
        let turn_id = TurnId::new();
        let row = TurnRow::from_new(&turn_id, turn)?;

        debug!(turn_id = %turn_id, session_id = %row.session_id, "storing turn");

        let _created: Option<TurnRow> = self
            .db
            .create("turns")
            .content(row)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;

        Ok(turn_id)
    }

    async fn search(&self, query: &SearchQuery) -> LedgerResult<Vec<SearchHit>> {
        let rows = match &query.session_id {
            Some(sid) => self.rows_for_session(sid).await?,
            None => self.all_rows().await?,
        };
        let records: Vec<LedgerRecord> = rows.into_iter().map(TurnRow::into_record).collect();
        Ok(rank_records(records.iter(), query))
    }

    async fn get_recent(&self, session_id: &str, limit: usize) -> LedgerResult<Vec<LedgerRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let sid = session_id.to_string();
        let mut res = self
            .db
            .query(RECENT_QUERY)
            .bind(("sid", sid))
            .bind(("limit", limit as i64))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let rows: Vec<TurnRow> = res
            .take(0)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;

        // Newest first from the query; callers want chronological order.
        Ok(rows.into_iter().rev().map(TurnRow::into_record).collect())
    }
}
