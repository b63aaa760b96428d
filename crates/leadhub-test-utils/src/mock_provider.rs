// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging provider for deterministic testing.
//!
//! `MockProvider` implements `MessagingProvider` without any HTTP traffic.
//! Sends are captured for assertions, and failures can be scripted.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use leadhub_core::types::{AdapterType, HealthStatus, SentMessage};
use leadhub_core::{LeadhubError, MessagingProvider, PluginAdapter, ProviderError};

/// One captured provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum SentRequest {
    Text {
        to: String,
        text: String,
    },
    Template {
        to: String,
        name: String,
        language: String,
        components: serde_json::Value,
    },
}

impl SentRequest {
    pub fn to(&self) -> &str {
        match self {
            SentRequest::Text { to, .. } | SentRequest::Template { to, .. } => to,
        }
    }
}

/// A mock messaging provider.
///
/// Scripted failures are popped from a FIFO queue, one per call. When the
/// queue is empty the call succeeds with a fresh `wamid.mock-*` id.
pub struct MockProvider {
    sent: Arc<Mutex<Vec<SentRequest>>>,
    failures: Arc<Mutex<VecDeque<ProviderError>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Fail the next call with `error`. Queued failures are used in order.
    pub async fn fail_next(&self, error: ProviderError) {
        self.failures.lock().await.push_back(error);
    }

    /// Successful sends, in call order.
    pub async fn sent_messages(&self) -> Vec<SentRequest> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    async fn complete(&self, request: SentRequest) -> Result<SentMessage, ProviderError> {
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        self.sent.lock().await.push(request);
        Ok(SentMessage {
            provider_message_id: format!("wamid.mock-{}", uuid::Uuid::new_v4()),
        })
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadhubError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadhubError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingProvider for MockProvider {
    async fn send_text(&self, to: &str, text: &str) -> Result<SentMessage, ProviderError> {
        self.complete(SentRequest::Text {
            to: to.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn send_template(
        &self,
        to: &str,
        name: &str,
        language: &str,
        components: serde_json::Value,
    ) -> Result<SentMessage, ProviderError> {
        self.complete(SentRequest::Template {
            to: to.to_string(),
            name: name.to_string(),
            language: language.to_string(),
            components,
        })
        .await
    }
}
