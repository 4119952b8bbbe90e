//! Tool orchestration: bridges chat-completion tool-call directives to
//! the JSON-RPC tool layer and folds the results back into the
//! conversation.

use crate::backend::{ChatBackend, ChatRequest};
use crate::error::{ChatError, ChatResult};
use crate::message::{ChatMessage, Role};
use keepsake_mcp::{
    AuthorizationRequest, CallToolParams, HttpTransport, ListToolsResult, McpError, RpcOutcome,
    ToolDescriptor,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Outcome of one chat turn.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The assistant's final reply for this turn (possibly a synthetic
    /// error message; failures never crash a turn).
    Reply(String),
    /// The tool server demanded authentication mid-turn. The turn was
    /// abandoned; the caller should surface the authorization URL.
    AuthorizationPending(AuthorizationRequest),
}

/// Outcome of a single tool invocation.
#[derive(Debug)]
pub enum ToolOutcome {
    /// The tool's result payload, verbatim.
    Result(Value),
    /// Authentication required; the invocation was abandoned.
    AuthorizationPending(AuthorizationRequest),
}

/// Drives chat turns against the backend, invoking requested tools
/// sequentially over the JSON-RPC transport.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    transport: Arc<HttpTransport>,
    model: String,
    tools: RwLock<Vec<ToolDescriptor>>,
    conversation: RwLock<Vec<ChatMessage>>,
}

impl Orchestrator {
    /// Create an orchestrator with an empty conversation.
    pub fn new(backend: Arc<dyn ChatBackend>, transport: Arc<HttpTransport>, model: impl Into<String>) -> Self {
        Self {
            backend,
            transport,
            model: model.into(),
            tools: RwLock::new(Vec::new()),
            conversation: RwLock::new(Vec::new()),
        }
    }

    /// Currently advertised tool descriptors.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.clone()
    }

    /// The full conversation, including tool-bearing turns.
    pub async fn conversation(&self) -> Vec<ChatMessage> {
        self.conversation.read().await.clone()
    }

    /// The conversation as rendered to the user: tool-result turns and
    /// tool-requesting assistant turns are filtered out.
    pub async fn visible_messages(&self) -> Vec<ChatMessage> {
        self.conversation
            .read()
            .await
            .iter()
            .filter(|msg| match msg.role {
                Role::User => true,
                Role::Assistant => !msg.has_tool_calls(),
                Role::System | Role::Tool => false,
            })
            .cloned()
            .collect()
    }

    /// Fetch the tool list from the server.
    ///
    /// Must be re-run after authentication is (re)established, since
    /// tool availability is gated on it. Returns the pending
    /// authorization request if the server demanded authentication.
    pub async fn refresh_tool_list(&self) -> ChatResult<Option<AuthorizationRequest>> {
        match self.transport.call("tools/list", None).await? {
            RpcOutcome::Reply(result) => {
                let listed: ListToolsResult = serde_json::from_value(result)?;
                info!(count = listed.tools.len(), "Discovered tools");
                *self.tools.write().await = listed.tools;
                Ok(None)
            }
            RpcOutcome::AuthorizationPending(pending) => Ok(Some(pending)),
        }
    }

    /// Invoke a single tool by name.
    ///
    /// An RPC-level failure becomes `ChatError::ToolInvocation`
    /// carrying the server's message; a success result is returned
    /// verbatim.
    pub async fn invoke_tool(&self, name: &str, arguments: Value) -> ChatResult<ToolOutcome> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        match self
            .transport
            .call("tools/call", Some(serde_json::to_value(&params)?))
            .await
        {
            Ok(RpcOutcome::Reply(result)) => Ok(ToolOutcome::Result(result)),
            Ok(RpcOutcome::AuthorizationPending(pending)) => {
                Ok(ToolOutcome::AuthorizationPending(pending))
            }
            Err(McpError::Rpc { message, .. }) => Err(ChatError::ToolInvocation(message)),
            Err(e) => Err(e.into()),
        }
    }

    /// Run one chat turn for `user_text`.
    ///
    /// Failures fold into a synthetic assistant reply rather than
    /// escaping: at worst the turn fails and the conversation records
    /// the failure.
    pub async fn handle_chat_turn(&self, user_text: &str) -> TurnOutcome {
        self.conversation
            .write()
            .await
            .push(ChatMessage::user(user_text));

        match self.run_turn().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let text = e.to_string();
                warn!(error = %text, "Chat turn failed");
                self.conversation
                    .write()
                    .await
                    .push(ChatMessage::assistant(&text));
                TurnOutcome::Reply(text)
            }
        }
    }

    async fn run_turn(&self) -> ChatResult<TurnOutcome> {
        let reply = self.complete().await?;

        if !reply.has_tool_calls() {
            let text = reply.text().to_string();
            self.conversation.write().await.push(reply);
            return Ok(TurnOutcome::Reply(text));
        }

        let calls = reply.tool_calls.clone().unwrap_or_default();
        self.conversation.write().await.push(reply);

        // Strictly sequential: call k+1 never starts before call k's
        // result is recorded, and a failure aborts the rest of the chain.
        for call in &calls {
            let arguments: Value = match serde_json::from_str(&call.function.arguments) {
                Ok(value) => value,
                Err(e) => {
                    return Ok(self
                        .fail_turn(format!(
                            "Tool '{}' failed: malformed arguments: {e}",
                            call.function.name
                        ))
                        .await);
                }
            };

            match self.invoke_tool(&call.function.name, arguments).await {
                Ok(ToolOutcome::Result(result)) => {
                    let content = serde_json::to_string(&result)?;
                    self.conversation
                        .write()
                        .await
                        .push(ChatMessage::tool_result(&call.id, content));
                }
                Ok(ToolOutcome::AuthorizationPending(pending)) => {
                    self.conversation.write().await.push(ChatMessage::assistant(
                        "Authorization required. Please sign in, then try again.",
                    ));
                    return Ok(TurnOutcome::AuthorizationPending(pending));
                }
                Err(ChatError::ToolInvocation(message)) => {
                    return Ok(self
                        .fail_turn(format!("Tool '{}' failed: {message}", call.function.name))
                        .await);
                }
                Err(e) => return Err(e),
            }
        }

        // Exactly one follow-up completion with the tool results. If it
        // requests more tool calls they are recorded but not executed.
        let final_reply = self.complete().await?;
        if final_reply.has_tool_calls() {
            warn!("Follow-up reply requested more tool calls; not executing");
        }
        let text = final_reply.text().to_string();
        self.conversation.write().await.push(final_reply);
        Ok(TurnOutcome::Reply(text))
    }

    async fn fail_turn(&self, text: String) -> TurnOutcome {
        warn!(error = %text, "Tool chain aborted");
        self.conversation
            .write()
            .await
            .push(ChatMessage::assistant(&text));
        TurnOutcome::Reply(text)
    }

    async fn complete(&self) -> ChatResult<ChatMessage> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.conversation.read().await.clone(),
            tools: self.function_schemas().await,
        };
        self.backend.complete(request).await
    }

    /// Translate the advertised descriptors into the backend's
    /// function-schema shape.
    async fn function_schemas(&self) -> Vec<Value> {
        self.tools
            .read()
            .await
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }
}
