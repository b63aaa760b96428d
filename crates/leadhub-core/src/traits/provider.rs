// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging provider trait.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SentMessage;

/// A black-box "send message" capability.
///
/// Implementations normalize the recipient phone and enforce their own request
/// timeout, reporting it as [`ProviderError::Timeout`].
#[async_trait]
pub trait MessagingProvider: PluginAdapter {
    /// Sends a plain text message.
    async fn send_text(&self, to: &str, text: &str) -> Result<SentMessage, ProviderError>;

    /// Sends a pre-approved template message.
    async fn send_template(
        &self,
        to: &str,
        name: &str,
        language: &str,
        components: serde_json::Value,
    ) -> Result<SentMessage, ProviderError>;
}
