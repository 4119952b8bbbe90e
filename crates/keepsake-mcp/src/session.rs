//! Session-scoped credential state.
//!
//! The store owns the bearer token and the in-flight PKCE verifier for
//! one user session. It is an explicit context object shared (via
//! `Arc`) by the authorization flow and the transport rather than
//! ambient global state.

use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    code_verifier: Option<String>,
}

/// Holds the access token and the pending PKCE verifier for the
/// lifetime of one session.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Create an empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current access token, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    /// Store an access token.
    pub async fn set_access_token(&self, token: String) {
        self.state.write().await.access_token = Some(token);
        debug!("Stored access token");
    }

    /// Clear the access token (logout).
    pub async fn clear_access_token(&self) {
        self.state.write().await.access_token = None;
        debug!("Cleared access token");
    }

    /// Check whether a token is present.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.access_token.is_some()
    }

    /// Store the verifier for the current authorization attempt,
    /// replacing any pending one.
    pub async fn set_code_verifier(&self, verifier: String) {
        self.state.write().await.code_verifier = Some(verifier);
    }

    /// Take the pending verifier, leaving none behind. The verifier is
    /// single-use: whoever takes it owns the exchange attempt.
    pub async fn take_code_verifier(&self) -> Option<String> {
        self.state.write().await.code_verifier.take()
    }

    /// Check whether an authorization attempt is pending.
    pub async fn has_code_verifier(&self) -> bool {
        self.state.read().await.code_verifier.is_some()
    }

    /// Clear everything (session end).
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.access_token = None;
        state.code_verifier = None;
    }
}
