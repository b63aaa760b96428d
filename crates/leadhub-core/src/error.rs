// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Leadhub ingestion core.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Leadhub adapter traits and core operations.
#[derive(Debug, Error)]
pub enum LeadhubError {
    /// Configuration errors (invalid TOML, missing credentials, bad settings rows).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or unrecognized provider payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A write lost a race or targeted an entity in an incompatible state.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Messaging provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LeadhubError {
    /// Whether retrying the failed operation may succeed.
    ///
    /// Storage hiccups, timeouts, and transient provider failures are retryable.
    /// Parse, not-found, conflict, and configuration errors never are.
    pub fn is_transient(&self) -> bool {
        match self {
            LeadhubError::Storage { .. } | LeadhubError::Timeout { .. } => true,
            LeadhubError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Shorthand for a [`LeadhubError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LeadhubError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`LeadhubError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        LeadhubError::Conflict {
            message: message.into(),
        }
    }
}

/// Failure of an outbound messaging provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered with a non-success status. `body` is the raw error body.
    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// No response within the configured request timeout.
    #[error("provider request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Connection-level failure before a response was received.
    #[error("provider transport failure: {message}")]
    Transport { message: String },

    /// A success response that could not be interpreted.
    #[error("invalid provider response: {message}")]
    InvalidResponse { message: String },
}

impl ProviderError {
    /// Timeouts, transport failures, rate limits, and 5xx rejections are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Transport { .. } => true,
            ProviderError::Rejected { status, .. } => *status == 429 || *status >= 500,
            ProviderError::InvalidResponse { .. } => false,
        }
    }
}
