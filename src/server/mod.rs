//! HTTP front: `/health` and `/download`

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod conn;
pub mod error;
pub mod gate;
pub mod handlers;

pub use conn::{serve_connections, ConnLimits};

use crate::config::Config;
use crate::pipeline::{AudioSource, StreamPipeline};
use crate::Result;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn AudioSource>,
    /// Root of every request's cancellation scope; cancelled on shutdown
    pub shutdown: CancellationToken,
    pub peek_bytes: usize,
    pub read_timeout: Duration,
}

impl AppState {
    pub fn new(source: Arc<dyn AudioSource>, config: &Config) -> Self {
        Self {
            source,
            shutdown: CancellationToken::new(),
            peek_bytes: config.limits.peek_bytes,
            read_timeout: config.read_timeout(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/download",
            post(handlers::download).fallback(handlers::method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP service until Ctrl-C or SIGTERM
pub async fn serve(config: Config) -> Result<()> {
    let source = Arc::new(StreamPipeline::from_config(&config));
    let state = AppState::new(source, &config);
    let shutdown = state.shutdown.clone();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(
        "yt-download-mp3 v{} listening on port {}",
        env!("CARGO_PKG_VERSION"),
        config.server.port
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutting down, cancelling in-flight downloads");
        trigger.cancel();
    });

    serve_connections(
        listener,
        build_router(state),
        ConnLimits::from_config(&config),
        shutdown,
    )
    .await;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
