//! OpenAI-compatible chat-completions summarizer
//!
//! Sends the compaction prompt to any `/chat/completions` endpoint (Groq,
//! OpenAI, a local gateway) with a fixed summarizer system prompt and a low
//! temperature for stable summaries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Summarizer, SummarizerError};

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// System prompt framing the model as a conversation summarizer.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = "You are a conversation summarizer. Your job is to:
1. Extract key topics and important information
2. Identify URLs and resources mentioned
3. Compress conversations while preserving essential context
4. Maintain temporal flow and relationships
5. Focus on actionable insights and decisions made

Format your summaries as structured text that preserves searchable keywords.";

/// Summarizer endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    /// Bearer token (optional for local gateways)
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        SummarizerConfig {
            endpoint: std::env::var("RECALL_SUMMARIZER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            api_key: std::env::var("RECALL_SUMMARIZER_API_KEY").ok(),
            model: std::env::var("RECALL_SUMMARIZER_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: 0.1,
        }
    }
}

impl SummarizerConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint and model
    pub fn new(endpoint: &str, model: &str) -> Self {
        SummarizerConfig {
            endpoint: endpoint.to_string(),
            api_key: None,
            model: model.to_string(),
            temperature: 0.1,
        }
    }

    /// Set authentication token
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a chat-completions response body.
fn extract_summary(body: &str) -> Result<String, SummarizerError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| SummarizerError::Http(format!("unreadable response: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(SummarizerError::EmptyResponse)
}

/// Summarizer backed by an OpenAI-compatible chat-completions API
pub struct ChatCompletionsSummarizer {
    config: SummarizerConfig,
    http_client: reqwest::Client,
}

impl ChatCompletionsSummarizer {
    /// Create a new summarizer client
    pub fn new(config: SummarizerConfig) -> Result<Self, SummarizerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("recall-core/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ChatCompletionsSummarizer {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self, SummarizerError> {
        Self::new(SummarizerConfig::from_env())
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }
}

#[async_trait]
impl Summarizer for ChatCompletionsSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, SummarizerError> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SUMMARIZER_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: transcript,
                },
            ],
        };

        debug!(model = %self.config.model, chars = transcript.len(), "requesting summary");

        let mut builder = self.http_client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        extract_summary(&body)
    }
}
