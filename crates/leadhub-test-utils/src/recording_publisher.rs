// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event publisher that records what was published and can be told to fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use leadhub_core::{EventPublisher, LeadhubError, Topic};

/// One successful publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: serde_json::Value,
    pub seq: Option<i64>,
}

/// Records every successful publish and forwards it to an inner publisher.
///
/// Failures surface as timeouts so the retry loop treats them as transient.
pub struct RecordingPublisher {
    inner: Option<Arc<dyn EventPublisher>>,
    published: Mutex<Vec<Published>>,
    fail_remaining: AtomicU32,
    fail_always: AtomicBool,
    attempts: AtomicU32,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            inner: None,
            published: Mutex::new(Vec::new()),
            fail_remaining: AtomicU32::new(0),
            fail_always: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// Forward successful publishes to `inner` (usually the event bus).
    pub fn wrapping(inner: Arc<dyn EventPublisher>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new()
        }
    }

    /// Fail the next `n` publish calls.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every publish until [`RecordingPublisher::recover`] is called.
    pub fn fail_always(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.fail_always.store(false, Ordering::SeqCst);
        self.fail_remaining.store(0, Ordering::SeqCst);
    }

    /// Publish calls made, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn published(&self) -> Vec<Published> {
        self.published.lock().await.clone()
    }

    /// Topics of successful publishes, in order.
    pub async fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .map(|p| p.topic.clone())
            .collect()
    }

    /// Successful publishes on one topic.
    pub async fn on(&self, topic: &Topic) -> Vec<Published> {
        let wanted = topic.to_string();
        self.published
            .lock()
            .await
            .iter()
            .filter(|p| p.topic == wanted)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.published.lock().await.clear();
    }

    fn should_fail(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &Topic,
        payload: serde_json::Value,
        seq: Option<i64>,
    ) -> Result<usize, LeadhubError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Err(LeadhubError::Timeout {
                duration: Duration::from_millis(1),
            });
        }

        let receivers = match &self.inner {
            Some(inner) => inner.publish(topic, payload.clone(), seq).await?,
            None => 0,
        };
        self.published.lock().await.push(Published {
            topic: topic.to_string(),
            payload,
            seq,
        });
        Ok(receivers)
    }
}
