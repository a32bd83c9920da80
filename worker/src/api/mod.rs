//! Health endpoint
//!
//! A minimal HTTP surface so orchestrators can liveness-check the worker;
//! all real traffic arrives over the queues.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::core::ShutdownService;
use crate::core::constants::APP_NAME_LOWER;

#[derive(Serialize)]
pub struct HealthResponse {
    pub app: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            app: APP_NAME_LOWER,
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/v1/health", get(health))
}

/// Bind and serve the health endpoint until shutdown
pub async fn serve(host: &str, port: u16, shutdown: &ShutdownService) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Health endpoint listening");

    let wait = shutdown.wait();
    axum::serve(listener, router())
        .with_graceful_shutdown(wait)
        .await?;
    Ok(())
}
