//! Bearer-authenticated JSON-RPC transport over HTTP POST.

use crate::error::{McpError, McpResult};
use crate::oauth::{AuthFlow, AuthorizationRequest};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::session::SessionStore;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a JSON-RPC call.
#[derive(Debug)]
pub enum RpcOutcome {
    /// The server answered; this is the `result` payload.
    Reply(Value),
    /// The server demanded authentication. The call was abandoned (not
    /// queued) and a fresh authorization attempt has been started; the
    /// caller should surface `url` and retry after the flow completes.
    AuthorizationPending(AuthorizationRequest),
}

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Tool endpoint URL, e.g. `https://localhost:4096/api/mcp`.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl TransportConfig {
    /// Create a config with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: 60,
        }
    }
}

/// JSON-RPC transport for the tool endpoint.
///
/// Assigns strictly increasing integer ids starting at 1 for the life
/// of one instance; notifications carry an explicit null id and never
/// consume an id slot.
pub struct HttpTransport {
    config: TransportConfig,
    client: reqwest::Client,
    session: Arc<SessionStore>,
    auth: Arc<AuthFlow>,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a new transport sharing the session store with the flow
    /// manager that recovers from authentication failures.
    pub fn new(
        config: TransportConfig,
        session: Arc<SessionStore>,
        auth: Arc<AuthFlow>,
    ) -> McpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            session,
            auth,
            next_id: AtomicU64::new(1),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send(&self, request: &JsonRpcRequest) -> McpResult<reqwest::Response> {
        let mut builder = self.client.post(&self.config.endpoint).json(request);

        if let Some(token) = self.session.access_token().await {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        Ok(builder.send().await?)
    }

    /// Send a request and wait for its correlated response.
    ///
    /// A 401 does not retry: the in-flight call is abandoned and a new
    /// authorization attempt is started instead (the redirect-based
    /// flow cannot resume this caller).
    pub async fn call(&self, method: &str, params: Option<Value>) -> McpResult<RpcOutcome> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        debug!(method = %request.method, id = ?request.id, "JSON-RPC call");

        let response = self.send(&request).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(method = %request.method, "Authentication required, restarting authorization");
            let pending = self.auth.begin_authorization().await?;
            return Ok(RpcOutcome::AuthorizationPending(pending));
        }
        if !status.is_success() {
            return Err(McpError::Transport(status.as_u16()));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| McpError::protocol(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(error) = body.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        Ok(RpcOutcome::Reply(body.result.unwrap_or(Value::Null)))
    }

    /// Send a notification. No body is read beyond the HTTP status; a
    /// 401 restarts the authorization flow without surfacing an error.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcRequest::notification(method, params);
        debug!(method = %notification.method, "JSON-RPC notification");

        let response = self.send(&notification).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(method = %notification.method, "Authentication required during notification");
            let _ = self.auth.begin_authorization().await?;
            return Ok(());
        }
        if !status.is_success() {
            return Err(McpError::Transport(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{AuthPhase, OAuthConfig, WELL_KNOWN_PATH};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport_against(server: &MockServer) -> (HttpTransport, Arc<SessionStore>) {
        let session = Arc::new(SessionStore::new());
        let auth = Arc::new(
            AuthFlow::new(
                server.uri(),
                OAuthConfig::new("keepsake-cli", "http://localhost/cb"),
                session.clone(),
            )
            .unwrap(),
        );
        let transport = HttpTransport::new(
            TransportConfig::new(format!("{}/api/mcp", server.uri())),
            session.clone(),
            auth,
        )
        .unwrap();
        (transport, session)
    }

    fn reply(id: u64, result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
    }

    #[tokio::test]
    async fn test_ids_strictly_increase_across_calls_and_notifications() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .and(body_partial_json(json!({"id": 1})))
            .respond_with(reply(1, json!({"ok": 1})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .and(body_partial_json(json!({"id": 2})))
            .respond_with(reply(2, json!({"ok": 2})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .and(body_partial_json(json!({"id": null})))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (transport, _) = transport_against(&server).await;
        let first = transport.call("tools/list", None).await.unwrap();
        // A notification in between must not consume an id slot.
        transport.notify("notifications/initialized", None).await.unwrap();
        let second = transport.call("tools/list", None).await.unwrap();

        match (first, second) {
            (RpcOutcome::Reply(a), RpcOutcome::Reply(b)) => {
                assert_eq!(a["ok"], 1);
                assert_eq!(b["ok"], 2);
            }
            other => panic!("unexpected outcomes: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bearer_header_attached_when_token_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .and(header("Authorization", "Bearer tok-xyz"))
            .respond_with(reply(1, json!("authed")))
            .mount(&server)
            .await;

        let (transport, session) = transport_against(&server).await;
        session.set_access_token("tok-xyz".to_string()).await;

        match transport.call("tools/list", None).await.unwrap() {
            RpcOutcome::Reply(value) => assert_eq!(value, json!("authed")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_starts_auth_flow_and_abandons_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_endpoint": format!("{}/api/oauth/authorize", server.uri()),
                "token_endpoint": format!("{}/api/oauth/token", server.uri()),
            })))
            .mount(&server)
            .await;

        let (transport, session) = transport_against(&server).await;
        let outcome = transport.call("tools/call", Some(json!({"name": "x"}))).await.unwrap();

        match outcome {
            RpcOutcome::AuthorizationPending(pending) => {
                assert!(pending.url.contains("code_challenge="));
                assert!(pending.url.contains("code_challenge_method=S256"));
            }
            other => panic!("expected pending authorization, got {other:?}"),
        }
        // A fresh verifier is parked for the new attempt.
        assert!(session.has_code_verifier().await);
        assert_eq!(transport.auth.phase().await, AuthPhase::AwaitingRedirect);
    }

    #[tokio::test]
    async fn test_non_401_failure_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (transport, _) = transport_against(&server).await;
        let err = transport.call("tools/list", None).await.unwrap_err();
        assert!(matches!(err, McpError::Transport(503)));
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32601, "message": "Method 'bogus' not found"},
            })))
            .mount(&server)
            .await;

        let (transport, _) = transport_against(&server).await;
        let err = transport.call("bogus", None).await.unwrap_err();
        match err {
            McpError::Rpc { code, message, .. } => {
                assert_eq!(code, -32601);
                assert!(message.contains("bogus"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_notification_ignores_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let (transport, _) = transport_against(&server).await;
        transport.notify("notifications/initialized", None).await.unwrap();
    }
}
