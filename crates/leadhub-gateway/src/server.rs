// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use leadhub_assign::AssignmentEngine;
use leadhub_bus::EventBus;
use leadhub_config::model::GatewayConfig;
use leadhub_core::{LeadhubError, StorageAdapter};
use leadhub_ingest::{IngestionOrchestrator, OutboundDispatcher};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::webhook;
use crate::ws;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Secrets used on the provider webhook.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    /// Token expected in the subscription handshake.
    pub verify_token: Option<String>,
    /// When set, POST bodies must carry a valid signature.
    pub app_secret: Option<String>,
}

impl std::fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSecrets")
            .field("verify_token", &self.verify_token.as_ref().map(|_| "[redacted]"))
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub storage: Arc<dyn StorageAdapter>,
    pub bus: Arc<EventBus>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub dispatcher: Arc<OutboundDispatcher>,
    pub engine: Arc<AssignmentEngine>,
    pub webhook: WebhookSecrets,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Health state for unauthenticated endpoints.
    pub health: HealthState,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Build the gateway router.
///
/// - GET/POST /webhook/whatsapp (provider handshake and deliveries)
/// - GET /health
/// - GET /v1/conversations, GET /v1/conversations/{id}/messages,
///   POST /v1/assignments/run (with auth)
/// - GET /ws (auth during handshake, not via middleware)
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhook/whatsapp",
            get(webhook::verify).post(webhook::receive),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/conversations", get(handlers::list_conversations))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::list_messages),
        )
        .route("/v1/assignments/run", post(handlers::run_assignments))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), LeadhubError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LeadhubError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| LeadhubError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
