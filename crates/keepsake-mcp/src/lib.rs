//! Tool-protocol client for keepsake.
//!
//! Talks JSON-RPC to the personal-records tool endpoint over HTTP,
//! attaching the session's bearer token and recovering from
//! authentication failures by restarting the OAuth PKCE flow.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ orchestrator │────▶│ HttpTransport │────▶│ /api/mcp     │
//! └──────────────┘     │   (bearer)    │◀────│ (tool server)│
//!                      └───────┬───────┘     └──────────────┘
//!                          401 │ restart
//!                      ┌───────▼───────┐     ┌──────────────┐
//!                      │   AuthFlow    │────▶│ auth server  │
//!                      │ (PKCE, 2-ph.) │◀────│ (discovery,  │
//!                      └───────┬───────┘     │  token)      │
//!                      ┌───────▼───────┐     └──────────────┘
//!                      │ SessionStore  │
//!                      └───────────────┘
//! ```

mod error;
pub mod oauth;
pub mod protocol;
mod session;
mod transport;

pub use error::{McpError, McpResult};
pub use oauth::{
    challenge_from_verifier, generate_verifier, AuthFlow, AuthPhase, AuthorizationRequest,
    OAuthConfig, ServerMetadata, DEFAULT_VERIFIER_LENGTH, WELL_KNOWN_PATH,
};
pub use protocol::{
    CallToolParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ToolDescriptor,
};
pub use session::SessionStore;
pub use transport::{HttpTransport, RpcOutcome, TransportConfig};
