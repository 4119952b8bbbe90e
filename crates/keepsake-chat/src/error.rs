//! Error types for chat orchestration.

use keepsake_mcp::McpError;
use thiserror::Error;

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors that can occur while driving a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The chat backend rejected or failed the completion request.
    #[error("Chat backend error: {0}")]
    Backend(String),

    /// A tool call failed at the RPC level; carries the server's message.
    #[error("Tool invocation failed: {0}")]
    ToolInvocation(String),

    /// Failure in the tool-protocol layer.
    #[error(transparent)]
    Mcp(#[from] McpError),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ChatError::Backend("upstream 500".to_string()).to_string(),
            "Chat backend error: upstream 500"
        );
        assert_eq!(
            ChatError::ToolInvocation("Unknown tool 'x'".to_string()).to_string(),
            "Tool invocation failed: Unknown tool 'x'"
        );
    }

    #[test]
    fn test_mcp_error_is_transparent() {
        let err: ChatError = McpError::Transport(502).into();
        assert_eq!(err.to_string(), "Tool endpoint returned HTTP 502");
    }
}
