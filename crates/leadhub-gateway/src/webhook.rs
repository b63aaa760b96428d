// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook endpoints.
//!
//! The POST handler answers 200 for anything it can read, including bodies it
//! does not understand, so the provider does not retry deliveries we chose to
//! drop. The only rejection is a bad signature when an app secret is set.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use leadhub_ingest::EventState;
use leadhub_whatsapp::{SIGNATURE_HEADER, VerifyQuery, verify_signature, verify_subscription};
use serde::Serialize;
use tracing::{debug, warn};

use crate::server::GatewayState;

/// Acknowledgement body for POST /webhook/whatsapp.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub events: usize,
    pub published: usize,
}

/// GET /webhook/whatsapp
///
/// Subscription handshake: echo `hub.challenge` when the token matches.
pub async fn verify(
    State(state): State<GatewayState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    match verify_subscription(&query, state.webhook.verify_token.as_deref()) {
        Some(challenge) => {
            debug!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!(mode = ?query.mode, "webhook subscription rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook/whatsapp
pub async fn receive(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.webhook.app_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, &body, header) {
            warn!(error = %e, "webhook signature rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "webhook body is not JSON, dropped");
            return ack(false, 0, 0);
        }
    };

    let report = state.orchestrator.ingest_payload(&payload).await;
    ack(
        report.recognized,
        report.events.len(),
        report.count(EventState::Published),
    )
}

fn ack(received: bool, events: usize, published: usize) -> Response {
    (
        StatusCode::OK,
        Json(WebhookAck {
            received,
            events,
            published,
        }),
    )
        .into_response()
}
