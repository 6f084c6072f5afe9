//! Telemetry HTTP server: Prometheus metrics and a health probe.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::metrics::ListenerMetrics;
use crate::shutdown::ShutdownToken;
use crate::supervisor::Service;

/// Content type of the Prometheus text exposition format.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

/// Serves `endpoint` (metrics) and `/healthz` until shut down.
pub struct TelemetryServer {
    addr: SocketAddr,
    endpoint: String,
    metrics: Arc<ListenerMetrics>,
}

impl TelemetryServer {
    pub fn new(addr: SocketAddr, endpoint: impl Into<String>, metrics: Arc<ListenerMetrics>) -> Self {
        Self {
            addr,
            endpoint: endpoint.into(),
            metrics,
        }
    }

    pub fn router(&self) -> Router {
        router(&self.endpoint, Arc::clone(&self.metrics))
    }
}

/// Build the telemetry routes.
pub fn router(endpoint: &str, metrics: Arc<ListenerMetrics>) -> Router {
    Router::new()
        .route(endpoint, get(render_metrics))
        .route("/healthz", get(healthz))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<ListenerMetrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        metrics.render(),
    )
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "listener".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[async_trait]
impl Service for TelemetryServer {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    async fn run(self: Box<Self>, shutdown: ShutdownToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("binding telemetry server to {}", self.addr))?;
        info!(addr = %self.addr, endpoint = %self.endpoint, "Telemetry server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                let cause = shutdown.cause().unwrap_or_else(|| "canceled".to_string());
                info!(cause = %cause, "Telemetry server shutting down");
            })
            .await
            .context("telemetry server failed")
    }
}
