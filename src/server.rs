//! Proxy HTTP server
//!
//! ```text
//! Browser ──POST {route}──> completion-proxy ──POST + Bearer key──> upstream API
//!         <──JSON / error──                  <──JSON / error text──
//! ```
//!
//! Every method on the proxy route reaches the handler so that non-POST
//! requests receive the plain-text 405 body rather than axum's empty one.
//! The method is checked before the body is read; an over-sized POST body
//! is a 500 like any other internal failure.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::proxy::ProxyHandler;
use axum::{
    body::Body,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// ============================================================================
// SERVER STATE
// ============================================================================

pub struct ProxyServerState {
    pub handler: ProxyHandler,
}

impl ProxyServerState {
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        Ok(Self {
            handler: ProxyHandler::new(config)?,
        })
    }
}

// ============================================================================
// /health ENDPOINT
// ============================================================================

pub async fn health_check() -> &'static str {
    "OK"
}

// ============================================================================
// PROXY ENDPOINT
// ============================================================================

async fn relay(handler: &ProxyHandler, method: &Method, body: Body) -> Result<Value, ProxyError> {
    if *method != Method::POST {
        return Err(ProxyError::MethodNotAllowed);
    }
    let bytes = handler.read_body(body).await?;
    handler.handle(method, &bytes).await
}

/// {route} - Forward a chat completion request upstream
pub async fn proxy_chat(
    State(state): State<Arc<ProxyServerState>>,
    method: Method,
    body: Body,
) -> Response {
    let result = relay(&state.handler, &method, body).await;

    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => {
            match &e {
                ProxyError::MethodNotAllowed => warn!("Rejected {} request", method),
                // Upstream failures are logged with their body where they occur
                ProxyError::Upstream { .. } => {}
                _ => error!(kind = e.kind(), "Proxy request failed: {}", e),
            }
            e.into_response()
        }
    }
}

// ============================================================================
// SERVER STARTUP
// ============================================================================

pub fn router(state: Arc<ProxyServerState>) -> Router {
    let route = state.handler.config().route.clone();

    Router::new()
        .route("/health", get(health_check))
        .route(&route, any(proxy_chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

pub async fn run_server(config: ProxyConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let route = config.route.clone();
    let upstream_url = config.upstream_url.clone();
    let key_status = if config.api_key().is_some() {
        "configured"
    } else {
        "MISSING"
    };

    if config.api_key().is_none() {
        warn!("No upstream API key configured; proxy requests will fail with 500");
    }

    let state = Arc::new(ProxyServerState::new(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║               Chat Completion Proxy                          ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Upstream:     {:46} ║", upstream_url);
    info!("║  API key:      {:46} ║", key_status);
    info!("║  Listening on: {:46} ║", addr);
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Endpoints:                                                  ║");
    info!("║    GET  /health  - Health check                              ║");
    info!("║    POST {:14} - Chat completion proxy                   ║", route);
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(listener, app).await?;

    Ok(())
}
