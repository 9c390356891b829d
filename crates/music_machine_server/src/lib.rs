use std::sync::Arc;

use anyhow::Context;
use music_machine_core::SequenceStore;
use tracing::{Level, info, warn};

mod http_server;
pub mod session;

pub use http_server::{AppError, AppState, create_router};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Signs session cookies. Must be at least 64 bytes.
    pub secret_key: Option<String>,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5050,
            secret_key: None,
            debug: false,
        }
    }
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize tracing
    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let cookie_key = session::session_key(config.secret_key.as_deref())?;

    // The store lives exactly as long as the server
    let store = Arc::new(SequenceStore::new());
    let state = AppState::new(store.clone(), cookie_key);

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, discarding {} sequences", store.len());
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            // Without a signal handler, run until the process is killed
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
