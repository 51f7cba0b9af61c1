//! Axum HTTP server.
//!
//! Routes:
//! - `POST /api/proxy`: relay a chat request upstream
//! - `GET /api/proxy`: liveness acknowledgement
//! - `OPTIONS /api/proxy`: permissive CORS preflight
//! - `GET /health`: process health for supervisors

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::relay::Relay;

pub const PROXY_PATH: &str = "/api/proxy";

pub const LIVENESS_MESSAGE: &str = "API proxy service is running";

/// Chat payloads can carry inline images, so allow more than axum's 2 MiB.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct LivenessResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    upstream_configured: bool,
}

pub fn router(relay: Relay) -> Router {
    Router::new()
        .route(
            PROXY_PATH,
            get(liveness_handler)
                .post(proxy_handler)
                .options(preflight_handler),
        )
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(relay)
}

pub async fn serve(relay: Relay, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(addr = %addr, "oneline-relay listening");
    if !relay.is_configured() {
        warn!("API_ENDPOINT or API_KEY is not set; POST {} will answer 500", PROXY_PATH);
    }

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn proxy_handler(
    State(relay): State<Relay>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let result = match body {
        Ok(body) => relay.forward(&body).await,
        // A missing upstream configuration outranks anything about the body.
        Err(rejection) => Err(match relay.config().credentials() {
            Err(e) => e,
            Ok(_) => {
                warn!(status = %rejection.status(), "request body rejected");
                RelayError::body_rejected(&rejection)
            }
        }),
    };

    match result {
        Ok(reply) => reply.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        message: LIVENESS_MESSAGE,
    })
}

async fn preflight_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "Content-Type, Authorization",
            ),
        ],
    )
}

async fn health_handler(State(relay): State<Relay>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        upstream_configured: relay.is_configured(),
    })
}
