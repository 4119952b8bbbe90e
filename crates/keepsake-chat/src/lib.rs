//! Chat orchestration for keepsake.
//!
//! Bridges a chat-completion backend to the JSON-RPC tool layer: each
//! turn sends the conversation plus the advertised tool schemas, runs
//! any requested tool calls sequentially over `keepsake-mcp`, and
//! feeds the results back for exactly one follow-up completion.

mod backend;
mod error;
pub mod message;
#[cfg(test)]
pub mod mock;
mod orchestrator;

pub use backend::{ChatBackend, ChatRequest, HttpChatBackend};
pub use error::{ChatError, ChatResult};
pub use message::{ChatMessage, FunctionCall, Role, ToolCall};
pub use orchestrator::{Orchestrator, ToolOutcome, TurnOutcome};
