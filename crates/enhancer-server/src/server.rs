//! HTTP server implementation using Axum.

use crate::handlers;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use enhancer_core::config::ServiceConfig;
use enhancer_core::Upscaler;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers.
pub struct AppState {
    /// Model backend
    pub upscaler: Arc<dyn Upscaler>,
    /// Request body limit, also quoted in 413 responses
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(upscaler: Arc<dyn Upscaler>) -> Self {
        Self {
            upscaler,
            max_upload_bytes: ServiceConfig::MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/enhance-from-url", post(handlers::enhance_from_url))
        .route("/enhance-from-file", post(handlers::enhance_from_file))
        .route("/enhance-batch", post(handlers::enhance_batch))
        .route("/status/:job_id", get(handlers::prediction_status))
        .route("/download/:image_id", get(handlers::download_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and start serving in the background.
///
/// Returns the actual address the server is bound to (useful when port=0)
/// and the handle of the serving task, which finishes once `shutdown` resolves.
pub async fn start_server<F>(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    shutdown: F,
) -> anyhow::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    });

    Ok((actual_addr, handle))
}

/// Resolves on Ctrl-C, or on SIGTERM where available (container stop).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
