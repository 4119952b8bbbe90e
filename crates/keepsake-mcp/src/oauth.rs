//! OAuth 2.0 Authorization Code with PKCE.
//!
//! Implements the client half of the handshake: verifier/challenge
//! generation, the authorization redirect URL, and the code exchange
//! against the token endpoint discovered from the authorization
//! server's metadata document.

use crate::error::{McpError, McpResult};
use crate::session::SessionStore;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default PKCE verifier length in characters.
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// Well-known path of the authorization server metadata (RFC 8414).
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

/// Unreserved URI characters permitted in a PKCE verifier (RFC 7636).
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Generate a random PKCE code verifier of `length` characters drawn
/// from the unreserved set.
pub fn generate_verifier(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
        .collect()
}

/// Derive the S256 code challenge: base64url(SHA-256(verifier)), no padding.
pub fn challenge_from_verifier(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Authorization server metadata, from the well-known document.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// Client-side OAuth configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Fixed client identifier.
    pub client_id: String,
    /// Redirect URI pointing back into the application.
    pub redirect_uri: String,
    /// Requested scopes.
    pub scope: Option<String>,
    /// PKCE verifier length.
    pub verifier_length: usize,
}

impl OAuthConfig {
    /// Create a config with the default verifier length and no scopes.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: None,
            verifier_length: DEFAULT_VERIFIER_LENGTH,
        }
    }

    /// Set the requested scopes.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Where an authorization attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Idle,
    AwaitingRedirect,
    ExchangingCode,
    Authenticated,
    Failed,
}

/// A started authorization attempt. The embedding surface navigates to
/// (or shows) `url`; control resumes via `complete_authorization` with
/// the code observed on the redirect back.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Two-phase authorization flow manager.
///
/// `begin_authorization` produces the redirect URL and parks the
/// verifier in the session store; `complete_authorization` exchanges
/// the returned code for a bearer token. A second `begin` while one is
/// pending overwrites the pending verifier; attempts are never queued.
pub struct AuthFlow {
    /// Authorization server origin, e.g. `https://localhost:4096`.
    issuer: String,
    config: OAuthConfig,
    client: reqwest::Client,
    session: Arc<SessionStore>,
    phase: RwLock<AuthPhase>,
    /// Metadata discovered for the current attempt.
    metadata: RwLock<Option<ServerMetadata>>,
}

impl AuthFlow {
    /// Create a flow manager against the given authorization server.
    pub fn new(
        issuer: impl Into<String>,
        config: OAuthConfig,
        session: Arc<SessionStore>,
    ) -> McpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            issuer: issuer.into(),
            config,
            client,
            session,
            phase: RwLock::new(AuthPhase::Idle),
            metadata: RwLock::new(None),
        })
    }

    /// Current phase of the state machine.
    pub async fn phase(&self) -> AuthPhase {
        *self.phase.read().await
    }

    /// Fetch the authorization server metadata document.
    async fn discover(&self) -> McpResult<ServerMetadata> {
        let url = format!("{}{}", self.issuer, WELL_KNOWN_PATH);
        debug!(url = %url, "Fetching authorization server metadata");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| McpError::Discovery(e.to_string()))?;
        if !response.status().is_success() {
            return Err(McpError::Discovery(format!(
                "metadata endpoint returned HTTP {}",
                response.status().as_u16()
            )));
        }
        response
            .json::<ServerMetadata>()
            .await
            .map_err(|e| McpError::Discovery(e.to_string()))
    }

    /// Start an authorization attempt.
    ///
    /// Generates a fresh verifier/challenge pair, persists the verifier
    /// for the code exchange, and returns the URL to navigate to.
    pub async fn begin_authorization(&self) -> McpResult<AuthorizationRequest> {
        let metadata = match self.discover().await {
            Ok(metadata) => metadata,
            Err(e) => {
                *self.phase.write().await = AuthPhase::Failed;
                return Err(e);
            }
        };

        let verifier = generate_verifier(self.config.verifier_length);
        let challenge = challenge_from_verifier(&verifier);
        self.session.set_code_verifier(verifier).await;

        let url = build_authorization_url(
            &metadata.authorization_endpoint,
            &self.config.client_id,
            &self.config.redirect_uri,
            self.config.scope.as_deref(),
            &challenge,
        );

        *self.metadata.write().await = Some(metadata);
        *self.phase.write().await = AuthPhase::AwaitingRedirect;
        info!(client_id = %self.config.client_id, "Authorization attempt started");

        Ok(AuthorizationRequest { url })
    }

    /// Exchange the authorization code for an access token.
    ///
    /// The pending verifier is consumed whether or not the exchange
    /// succeeds; a failed exchange requires a fresh
    /// `begin_authorization`.
    pub async fn complete_authorization(&self, code: &str) -> McpResult<()> {
        let Some(verifier) = self.session.take_code_verifier().await else {
            *self.phase.write().await = AuthPhase::Failed;
            return Err(McpError::MissingVerifier);
        };

        *self.phase.write().await = AuthPhase::ExchangingCode;

        // Metadata from the current attempt; re-discover if absent.
        let metadata = match self.metadata.read().await.clone() {
            Some(metadata) => metadata,
            None => match self.discover().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    *self.phase.write().await = AuthPhase::Failed;
                    return Err(e);
                }
            },
        };

        match self
            .exchange_code(&metadata.token_endpoint, code, &verifier)
            .await
        {
            Ok(token) => {
                self.session.set_access_token(token).await;
                *self.phase.write().await = AuthPhase::Authenticated;
                info!("Authorization complete");
                Ok(())
            }
            Err(e) => {
                *self.phase.write().await = AuthPhase::Failed;
                warn!(error = %e, "Code exchange failed");
                Err(e)
            }
        }
    }

    async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
        verifier: &str,
    ) -> McpResult<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| McpError::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let description = response
                .json::<TokenErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error_description.or(body.error))
                .unwrap_or_else(|| format!("token endpoint returned HTTP {status}"));
            return Err(McpError::TokenExchange(description));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| McpError::TokenExchange(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }
}

/// Build the authorization URL for the S256 PKCE request.
pub fn build_authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: Option<&str>,
    code_challenge: &str,
) -> String {
    let mut url = format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&code_challenge={}&code_challenge_method=S256",
        authorization_endpoint,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(code_challenge),
    );
    if let Some(scope) = scope {
        url.push_str(&format!("&scope={}", urlencoding::encode(scope)));
    }
    url
}
