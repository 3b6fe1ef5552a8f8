//! HTTP and WebSocket server

pub mod control;
pub mod stream;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::registry::WakeWordRegistry;
use crate::session::SessionConfig;

/// Shared state for all handlers
pub struct AppState {
    pub registry: Arc<WakeWordRegistry>,
    pub config: ServiceConfig,
    next_session_id: AtomicU64,
}

impl AppState {
    pub fn new(registry: Arc<WakeWordRegistry>, config: ServiceConfig) -> Self {
        Self {
            registry,
            config,
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn session_config(&self) -> SessionConfig {
        self.config.session_config()
    }
}

/// Control plane plus the `/ws` streaming endpoint
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(control::router(Arc::clone(&state)))
        .merge(stream::router("/ws", state))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
}

/// Streaming-only router for the dedicated streaming listener
pub fn stream_router(state: Arc<AppState>) -> Router {
    stream::router("/", state).layer(TraceLayer::new_for_http())
}

/// Bind the configured listeners and serve until Ctrl-C
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let http_addr = state.config.http_addr;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {http_addr}"))?;
    info!("HTTP server listening on {} (streaming at /ws)", http_addr);

    let http = axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal());

    match state.config.stream_addr {
        Some(stream_addr) => {
            let listener = TcpListener::bind(stream_addr)
                .await
                .with_context(|| format!("failed to bind streaming listener on {stream_addr}"))?;
            info!("Streaming server listening on {}", stream_addr);

            let stream = axum::serve(listener, stream_router(state))
                .with_graceful_shutdown(shutdown_signal());

            tokio::try_join!(
                async { http.await.context("HTTP server failed") },
                async { stream.await.context("streaming server failed") },
            )?;
        }
        None => http.await.context("HTTP server failed")?,
    }

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

/// Control-plane error, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, error) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
