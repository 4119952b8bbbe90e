//! Error types for the tool-protocol client.

use thiserror::Error;

/// Result type for tool-protocol operations.
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur while talking to the tool server or the
/// authorization server.
#[derive(Debug, Error)]
pub enum McpError {
    /// No PKCE verifier is pending at code-exchange time. The user has
    /// to restart authorization; retrying the exchange cannot succeed.
    #[error("No pending authorization attempt: code verifier is missing")]
    MissingVerifier,

    /// The authorization server rejected the code exchange.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The authorization server metadata could not be fetched or parsed.
    #[error("Authorization server discovery failed: {0}")]
    Discovery(String),

    /// The tool endpoint returned a non-success, non-401 HTTP status.
    #[error("Tool endpoint returned HTTP {0}")]
    Transport(u16),

    /// The tool server returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Protocol-level failure (malformed response body).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
