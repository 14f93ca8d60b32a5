//! Client for the optional chat-completions endpoint used by the reasoning step.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

const SYSTEM_PROMPT: &str = "You are a research agent. Analyze the query and provide 3 key insights. \
Keep response under 150 words. Format as JSON with \"analysis\" and \"key_points\" array.";

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response had no choices")]
    Empty,
}

/// Text returned by the endpoint together with its reported token count.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub total_tokens: Option<i32>,
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    fn model(&self) -> &str;

    /// Ask the endpoint to analyze a research query.
    async fn reason(&self, query: &str) -> Result<Completion, ReasoningError>;
}

/// OpenAI-compatible chat-completions client.
pub struct ChatReasoner {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatReasoner {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReasoningError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: Option<i32>,
}

#[async_trait]
impl Reasoner for ChatReasoner {
    fn model(&self) -> &str {
        &self.model
    }

    async fn reason(&self, query: &str) -> Result<Completion, ReasoningError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Research query: {query}"),
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        let choice = chat.choices.into_iter().next().ok_or(ReasoningError::Empty)?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            total_tokens: chat.usage.and_then(|u| u.total_tokens),
        })
    }
}
