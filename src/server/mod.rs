pub mod error;
pub mod handler;
pub mod types;

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::utils::fetcher::DocumentFetcher;
use crate::utils::pdf::PdfExtractor;
use error::MSG_INTERNAL;
use handler::{convert, require_api_key};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub extractor: Arc<dyn PdfExtractor>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<dyn PdfExtractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            extractor,
        }
    }
}

/// Builds the gateway router with the convert handler mounted at
/// `config.mount_path` (`/convert` standalone, `/api/convert` when embedded).
pub fn router(state: AppState) -> Router {
    let mount_path = state.config.mount_path.clone();

    Router::new()
        .route(&mount_path, post(convert))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": MSG_INTERNAL })),
    )
        .into_response()
}

/// Binds the configured address and serves until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = SocketAddr::new(state.config.bind_addr, state.config.port);
    let mount_path = state.config.mount_path.clone();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(addr = %addr, mount_path = %mount_path, "Server running on port {}", addr.port());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated with an error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
