//! Keepsake - chat with your personal records service.
//!
//! Wires the session store, authorization flow, JSON-RPC transport and
//! tool orchestrator together behind a minimal line-based REPL.

use anyhow::Result;
use clap::Parser;
use keepsake_chat::{HttpChatBackend, Orchestrator, TurnOutcome};
use keepsake_mcp::{
    AuthFlow, AuthorizationRequest, HttpTransport, OAuthConfig, SessionStore, TransportConfig,
    DEFAULT_VERIFIER_LENGTH,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keepsake")]
#[command(author, version, about = "Chat with your personal records service", long_about = None)]
struct Cli {
    /// Base URL of the keepsake server
    #[arg(long, default_value = "https://localhost:4096")]
    base_url: String,

    /// Chat model to request
    #[arg(short, long, default_value = "gpt-4o")]
    model: String,

    /// OAuth client identifier
    #[arg(long, default_value = "keepsake-cli")]
    client_id: String,

    /// OAuth redirect URI (defaults to <base-url>/oauth/callback)
    #[arg(long)]
    redirect_uri: Option<String>,

    /// Requested OAuth scopes
    #[arg(long)]
    scope: Option<String>,

    /// PKCE verifier length
    #[arg(long, default_value_t = DEFAULT_VERIFIER_LENGTH)]
    verifier_length: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show_authorization(pending: &AuthorizationRequest) {
    println!("Authorization required. Open this URL in your browser:");
    println!("  {}", pending.url);
    println!("then paste the code from the redirect with: /login <code>");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let redirect_uri = cli
        .redirect_uri
        .clone()
        .unwrap_or_else(|| format!("{}/oauth/callback", cli.base_url));
    let mut oauth_config = OAuthConfig::new(cli.client_id.clone(), redirect_uri);
    oauth_config.verifier_length = cli.verifier_length;
    if let Some(scope) = cli.scope.clone() {
        oauth_config = oauth_config.with_scope(scope);
    }

    let session = Arc::new(SessionStore::new());
    let auth = Arc::new(AuthFlow::new(cli.base_url.as_str(), oauth_config, session.clone())?);
    let transport = Arc::new(HttpTransport::new(
        TransportConfig::new(format!("{}/api/mcp", cli.base_url)),
        session.clone(),
        auth.clone(),
    )?);
    let backend = Arc::new(HttpChatBackend::new(format!("{}/api/chat", cli.base_url))?);
    let orchestrator = Orchestrator::new(backend, transport, cli.model.clone());

    println!("keepsake - type a message, /login <code>, /tools, /logout, /quit");
    match orchestrator.refresh_tool_list().await {
        Ok(Some(pending)) => show_authorization(&pending),
        Ok(None) => debug!("Tool list ready"),
        Err(e) => println!("Could not load tools: {e}"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("> ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if !line.is_empty() {
            if let Some(code) = line.strip_prefix("/login ") {
                match auth.complete_authorization(code.trim()).await {
                    Ok(()) => {
                        println!("Signed in.");
                        // Tool availability is gated on authentication.
                        match orchestrator.refresh_tool_list().await {
                            Ok(Some(pending)) => show_authorization(&pending),
                            Ok(None) => {}
                            Err(e) => println!("Could not load tools: {e}"),
                        }
                    }
                    Err(e) => println!("Sign-in failed: {e}"),
                }
            } else if line == "/tools" {
                let tools = orchestrator.tools().await;
                if tools.is_empty() {
                    println!("No tools available (not signed in?)");
                }
                for tool in tools {
                    println!("  {:24} {}", tool.name, tool.description.unwrap_or_default());
                }
            } else if line == "/logout" {
                session.clear().await;
                println!("Signed out.");
            } else if line == "/quit" || line == "/exit" {
                break;
            } else {
                match orchestrator.handle_chat_turn(&line).await {
                    TurnOutcome::Reply(text) => println!("{text}"),
                    TurnOutcome::AuthorizationPending(pending) => show_authorization(&pending),
                }
            }
        }
        print!("> ");
        std::io::stdout().flush()?;
    }

    Ok(())
}
