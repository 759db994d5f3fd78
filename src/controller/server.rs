//! # HTTP Server
//!
//! HTTP server for metrics, health checks, and Kubernetes probes.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (200 while the controller is ready, 503 otherwise)
//!
//! The server listens on `METRICS_PORT` (5000 by default).

use crate::observability::metrics::REGISTRY;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Debug, Default)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
}

impl ServerState {
    #[must_use]
    pub fn ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::Relaxed);
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Bind `0.0.0.0:<port>`, mark the server ready and serve until the task is dropped
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let app = router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    state.set_ready(true);

    axum::serve(listener, app).await?;
    Ok(())
}

fn encode_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readyz_follows_state() {
        let state = Arc::new(ServerState::default());

        let response = readyz_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready(true);
        let response = readyz_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        assert_eq!(healthz_handler().await.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_encodes() {
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
