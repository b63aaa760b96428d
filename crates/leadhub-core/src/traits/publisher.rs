// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime publish seam.

use async_trait::async_trait;

use crate::error::LeadhubError;
use crate::topic::Topic;

/// Publishes events to realtime subscribers.
///
/// `seq` is the owning conversation's version when the event concerns a
/// conversation, letting consumers discard stale events.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    /// Publishes `payload` on `topic` and returns the number of live receivers.
    async fn publish(
        &self,
        topic: &Topic,
        payload: serde_json::Value,
        seq: Option<i64>,
    ) -> Result<usize, LeadhubError>;
}
