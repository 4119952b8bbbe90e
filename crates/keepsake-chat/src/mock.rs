//! Scripted chat backend for tests.

use crate::backend::{ChatBackend, ChatRequest};
use crate::error::ChatResult;
use crate::message::{ChatMessage, ToolCall};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A chat backend that replays scripted replies in order and captures
/// every request it receives.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<ChatMessage>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    /// Create a mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ChatMessage::assistant(text));
    }

    /// Queue a reply carrying tool-call directives.
    pub fn push_tool_calls(&self, calls: Vec<ToolCall>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ChatMessage::assistant_tool_calls(calls));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of completion calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, request: ChatRequest) -> ChatResult<ChatMessage> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ChatMessage::assistant("Mock reply"));
        Ok(reply)
    }
}
