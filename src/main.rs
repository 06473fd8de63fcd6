use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};

use twindle_signup::backend::{InMemoryBackend, RestBackend, SignupBackend};
use twindle_signup::config::ServerConfig;
use twindle_signup::signup::{SessionStore, signup_routes, spawn_expiry_task};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;

    eprintln!("🎓 Twindle signup v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/signup", config.port);

    // ── Backend ─────────────────────────────────────────────────────────
    let backend: Arc<dyn SignupBackend> = match config.backend.clone() {
        Some(rest) => {
            eprintln!("   Backend: {}", rest.base_url);
            Arc::new(RestBackend::new(rest)?)
        }
        None => {
            eprintln!("   Backend: in-memory (set TWINDLE_BACKEND_URL for a hosted one)");
            InMemoryBackend::without_call_log()
        }
    };

    // ── Sessions ────────────────────────────────────────────────────────
    let sessions = SessionStore::new(backend, config.signup.clone());
    let _expiry_handle = spawn_expiry_task(Arc::clone(&sessions), config.session_ttl);

    let app = signup_routes(sessions).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind signup server port {}", config.port))?;
    tracing::info!(port = config.port, "Signup server started");
    axum::serve(listener, app).await?;

    Ok(())
}
