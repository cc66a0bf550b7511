//! The memory facade handed to the agent runtime.

use std::sync::Arc;

use chrono::Utc;
use recall_ledger::{Ledger, SearchHit, SearchQuery, TimeRange, TurnId, TurnMetadata};

use crate::compaction::topics::{HeuristicTopicExtractor, TopicExtractor};
use crate::compaction::{CompactionPolicy, CompactionSettings};
use crate::config::MemoryConfig;
use crate::context::{AssembledContext, ContextAssembler, ContextSettings};
use crate::error::{ledger_call, MemoryResult};
use crate::history::{format_history_hits, format_url_hits};
use crate::session::{Session, SessionStore, SessionTracker, Turn, TurnReceipt};
use crate::summarizer::Summarizer;

const HISTORY_SEARCH_LIMIT: usize = 5;
const URL_SEARCH_LIMIT: usize = 10;

/// Bounded conversational memory over a [`Ledger`] and a [`Summarizer`].
///
/// Operations on different sessions may run concurrently; operations on
/// the same session must be serialized by the caller.
pub struct MemoryManager {
    config: MemoryConfig,
    ledger: Arc<dyn Ledger>,
    store: Arc<SessionStore>,
    tracker: Arc<SessionTracker>,
    assembler: ContextAssembler,
}

impl MemoryManager {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        summarizer: Arc<dyn Summarizer>,
        config: MemoryConfig,
    ) -> MemoryResult<Self> {
        Self::with_topic_extractor(
            ledger,
            summarizer,
            Arc::new(HeuristicTopicExtractor::new()),
            config,
        )
    }

    pub fn with_topic_extractor(
        ledger: Arc<dyn Ledger>,
        summarizer: Arc<dyn Summarizer>,
        topics: Arc<dyn TopicExtractor>,
        config: MemoryConfig,
    ) -> MemoryResult<Self> {
        config.validate()?;

        let store = Arc::new(SessionStore::new());
        let compaction = Arc::new(CompactionPolicy::new(
            ledger.clone(),
            summarizer,
            store.clone(),
            topics.clone(),
            CompactionSettings::from(&config),
        ));
        let tracker = Arc::new(SessionTracker::new(
            ledger.clone(),
            store.clone(),
            compaction,
            topics,
            &config,
        ));
        let assembler =
            ContextAssembler::new(tracker.clone(), ledger.clone(), ContextSettings::from(&config));

        Ok(Self {
            config,
            ledger,
            store,
            tracker,
            assembler,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Hot-session registry shared by every component of this manager.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Record one exchange; returns the ledger id of the stored turn.
    pub async fn add_turn(
        &self,
        session_id: &str,
        user_message: &str,
        response: &str,
        urls: Vec<String>,
        metadata: TurnMetadata,
    ) -> MemoryResult<TurnId> {
        Ok(self
            .record_turn(session_id, user_message, response, urls, metadata)
            .await?
            .turn_id)
    }

    /// Same as [`MemoryManager::add_turn`], also reporting what compaction did.
    pub async fn record_turn(
        &self,
        session_id: &str,
        user_message: &str,
        response: &str,
        urls: Vec<String>,
        metadata: TurnMetadata,
    ) -> MemoryResult<TurnReceipt> {
        self.tracker
            .add_turn(session_id, user_message, response, urls, metadata)
            .await
    }

    pub async fn get_context(&self, session_id: &str, max_tokens: usize) -> MemoryResult<String> {
        self.assembler.get_context(session_id, max_tokens).await
    }

    /// Context under the configured `max_context_tokens`.
    pub async fn get_default_context(&self, session_id: &str) -> MemoryResult<String> {
        self.get_context(session_id, self.config.max_context_tokens)
            .await
    }

    pub async fn assemble_context(
        &self,
        session_id: &str,
        max_tokens: usize,
    ) -> MemoryResult<AssembledContext> {
        self.assembler.assemble(session_id, max_tokens).await
    }

    /// Filtered relevance search straight against the ledger.
    pub async fn search(
        &self,
        query: &str,
        session_id: Option<&str>,
        time_range: Option<TimeRange>,
        urls: Vec<String>,
        limit: usize,
    ) -> MemoryResult<Vec<SearchHit>> {
        let mut request = SearchQuery::new(query, limit).with_urls(urls);
        if let Some(session_id) = session_id {
            request = request.in_session(session_id);
        }
        if let Some(range) = time_range {
            request = request.within(range);
        }
        ledger_call("search", self.config.ledger_timeout(), self.ledger.search(&request)).await
    }

    /// Hot state of `session_id`, restoring it from the ledger if unseen.
    pub async fn session(&self, session_id: &str) -> MemoryResult<Session> {
        self.tracker.get_or_restore(session_id).await
    }

    /// The newest `limit` hot turns, oldest first.
    pub async fn session_history(&self, session_id: &str, limit: usize) -> MemoryResult<Vec<Turn>> {
        let session = self.session(session_id).await?;
        Ok(session.recent(limit).to_vec())
    }

    /// Search conversation history, rendered for an agent tool result.
    ///
    /// `time_range` accepts `today`, `last_week`, `last_month` or a
    /// `YYYY-MM-DD` day; anything else is ignored.
    pub async fn search_history(
        &self,
        query: &str,
        time_range: Option<&str>,
        session_filter: Option<&str>,
    ) -> MemoryResult<String> {
        let range = time_range.and_then(|spec| TimeRange::parse_relative(spec, Utc::now()));
        let hits = self
            .search(query, session_filter, range, Vec::new(), HISTORY_SEARCH_LIMIT)
            .await?;
        Ok(format_history_hits(&hits))
    }

    /// Conversations that carried `url`, rendered for an agent tool result.
    pub async fn search_by_url(&self, url: &str) -> MemoryResult<String> {
        let hits = self
            .search(
                &format!("url: {url}"),
                None,
                None,
                vec![url.to_string()],
                URL_SEARCH_LIMIT,
            )
            .await?;
        Ok(format_url_hits(url, &hits))
    }

    /// Prefix `message` with the session's context, if it has any.
    pub async fn build_prompt(&self, session_id: &str, message: &str) -> MemoryResult<String> {
        let context = self.get_default_context(session_id).await?;
        if context.is_empty() {
            return Ok(message.to_string());
        }
        Ok(format!(
            "Previous conversation context:\n{context}\n\nCurrent message: {message}"
        ))
    }
}
