//! Chat backend client.

use crate::error::{ChatError, ChatResult};
use crate::message::ChatMessage;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Function schemas advertised to the model.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

/// The chat-completion seam. The backend takes the full conversation
/// and the advertised tools and returns one assistant message, which
/// may carry tool-call directives.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> ChatResult<ChatMessage>;
}

/// HTTP chat backend (`POST /api/chat`).
///
/// The endpoint proxies the request to a completion API and returns
/// the assistant message object as the response body.
pub struct HttpChatBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpChatBackend {
    /// Create a backend client for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, request: ChatRequest) -> ChatResult<ChatMessage> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting chat completion"
        );

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Backend(format!("HTTP {}: {text}", status.as_u16())));
        }

        let message: ChatMessage = response
            .json()
            .await
            .map_err(|e| ChatError::Backend(format!("invalid completion response: {e}")))?;
        Ok(message)
    }
}
