// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles GET /health, GET /v1/conversations, GET /v1/conversations/{id}/messages,
//! and POST /v1/assignments/run.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use leadhub_assign::BatchReport;
use leadhub_core::{
    Conversation, ConversationFilter, ConversationRepository, LeadhubError, Message, MessageStore,
};
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Seconds since the gateway started.
    pub uptime_secs: u64,
}

/// Query for GET /v1/conversations.
#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    /// Only conversations owned by this agent.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Only conversations waiting in the queue.
    #[serde(default)]
    pub unassigned: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A [`LeadhubError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LeadhubError);

impl From<LeadhubError> for ApiError {
    fn from(e: LeadhubError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LeadhubError::NotFound { .. } => StatusCode::NOT_FOUND,
            LeadhubError::Conflict { .. } => StatusCode::CONFLICT,
            LeadhubError::Parse { .. } => StatusCode::BAD_REQUEST,
            LeadhubError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            LeadhubError::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /v1/conversations
///
/// Open conversations, optionally filtered by owner or queue membership.
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let filter = ConversationFilter {
        assigned_to: query.user_id,
        unassigned_only: query.unassigned,
        include_closed: false,
        limit: query.limit,
    };
    let conversations = state.storage.list_conversations(filter).await?;
    Ok(Json(ConversationListResponse { conversations }))
}

/// GET /v1/conversations/{id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<MessageListResponse>, ApiError> {
    if state.storage.get_conversation(&id).await?.is_none() {
        return Err(LeadhubError::not_found("conversation", id).into());
    }
    let messages = state.storage.list_messages(&id, None).await?;
    Ok(Json(MessageListResponse {
        conversation_id: id,
        messages,
    }))
}

/// POST /v1/assignments/run
///
/// Assigns every queued conversation and eligible lead.
pub async fn run_assignments(
    State(state): State<GatewayState>,
) -> Result<Json<BatchReport>, ApiError> {
    let report = state.engine.assign_all().await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_query_defaults() {
        let query: ConversationQuery = serde_json::from_str("{}").unwrap();
        assert!(query.user_id.is_none());
        assert!(!query.unassigned);
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(
            ApiError(LeadhubError::not_found("conversation", "x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(LeadhubError::conflict("closed")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(LeadhubError::Internal("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
    }
}
