// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer authentication for the REST and WebSocket routes.
//!
//! When no token is configured, all requests are rejected (fail-closed).
//! The provider webhook and `/health` are never behind this check.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects every authenticated route.
    pub bearer_token: Option<String>,
}

impl AuthConfig {
    /// Whether `presented` matches the configured token.
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.bearer_token, presented) {
            (Some(expected), Some(token)) => !expected.is_empty() && token == expected,
            _ => false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware that validates the bearer token.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("gateway has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    if auth.accepts(bearer_token(request.headers())) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
