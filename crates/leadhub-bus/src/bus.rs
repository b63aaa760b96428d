// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-topic broadcast channels.
//!
//! Delivery is best effort: an event reaches whoever is subscribed when it is
//! emitted, and a subscriber that falls more than `capacity` events behind
//! skips the oldest ones. There is no replay; clients that reconnect reload a
//! snapshot over REST.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use leadhub_core::{
    AdapterType, EventPublisher, HealthStatus, LeadhubError, PluginAdapter, Topic,
};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::event::Event;

/// Topic-keyed realtime event bus.
pub struct EventBus {
    channels: DashMap<Topic, broadcast::Sender<Arc<Event>>>,
    capacity: usize,
    dropped: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl EventBus {
    /// Create a bus whose per-topic buffers hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            dropped: Arc::new(AtomicU64::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// Emit an event and return how many receivers it reached.
    ///
    /// Topics nobody has subscribed to are skipped without allocating a channel.
    pub fn emit(&self, topic: &Topic, payload: Value, seq: Option<i64>) -> usize {
        let Some(sender) = self.channels.get(topic).map(|s| s.clone()) else {
            trace!(%topic, "no subscribers, event skipped");
            return 0;
        };
        let event = Arc::new(Event::new(topic, payload, seq));
        sender.send(event).unwrap_or(0)
    }

    /// A raw receiver for `topic`.
    pub fn receiver(&self, topic: &Topic) -> Result<broadcast::Receiver<Arc<Event>>, LeadhubError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LeadhubError::Internal("event bus is closed".into()));
        }
        let sender = self
            .channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        Ok(sender.subscribe())
    }

    /// Run `handler` for every event on `topic` until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<H>(&self, topic: Topic, handler: H) -> Result<Subscription, LeadhubError>
    where
        H: Fn(Arc<Event>) + Send + Sync + 'static,
    {
        let mut rx = self.receiver(&topic)?;
        let dropped = self.dropped.clone();
        let task_topic = topic.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler(event),
                    Err(RecvError::Lagged(skipped)) => {
                        dropped.fetch_add(skipped, Ordering::Relaxed);
                        warn!(topic = %task_topic, skipped, "subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(topic = %task_topic, "subscription ended");
        });
        Ok(Subscription { topic, task })
    }

    /// Live receivers on `topic`.
    pub fn receiver_count(&self, topic: &Topic) -> usize {
        self.channels
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.channels.len()
    }

    /// Drop channels that no longer have receivers. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        before.saturating_sub(self.channels.len())
    }

    /// Total events skipped by lagging subscribers since startup.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting subscriptions and close every channel.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.channels.clear();
    }
}

/// A live handler registration on one topic. Dropping it unsubscribes.
pub struct Subscription {
    topic: Topic,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// False once the bus closed the topic or the handler task ended.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Explicit unsubscribe; same as dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(
        &self,
        topic: &Topic,
        payload: Value,
        seq: Option<i64>,
    ) -> Result<usize, LeadhubError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LeadhubError::Internal("event bus is closed".into()));
        }
        Ok(self.emit(topic, payload, seq))
    }
}

#[async_trait]
impl PluginAdapter for EventBus {
    fn name(&self) -> &str {
        "event-bus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Fanout
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadhubError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(HealthStatus::Unhealthy("closed".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadhubError> {
        self.close();
        debug!("event bus closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn collector() -> (
        impl Fn(Arc<Event>) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<Arc<Event>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |event| {
                let _ = tx.send(event);
            },
            rx,
        )
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Arc<Event>>) -> Arc<Event> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn emit_without_subscribers_reaches_nobody() {
        let bus = EventBus::new(8);
        assert_eq!(bus.emit(&Topic::LeadNew, json!({}), None), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_topic() {
        let bus = EventBus::new(8);
        let (handler, mut rx) = collector();
        let _sub = bus.subscribe(Topic::QueueUpdate, handler).unwrap();

        bus.emit(&Topic::LeadNew, json!({"n": 0}), None);
        assert_eq!(bus.emit(&Topic::QueueUpdate, json!({"n": 1}), Some(3)), 1);

        let event = next(&mut rx).await;
        assert_eq!(event.topic, "queue:update");
        assert_eq!(event.payload["n"], 1);
        assert_eq!(event.seq, Some(3));
    }

    #[tokio::test]
    async fn per_topic_order_is_preserved() {
        let bus = EventBus::new(16);
        let topic = Topic::ConversationMessage("c1".into());
        let (handler, mut rx) = collector();
        let _sub = bus.subscribe(topic.clone(), handler).unwrap();

        for seq in 1..=5 {
            bus.emit(&topic, json!({}), Some(seq));
        }
        for seq in 1..=5 {
            assert_eq!(next(&mut rx).await.seq, Some(seq));
        }
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new(8);
        let (handler, mut rx) = collector();
        let sub = bus.subscribe(Topic::LeadUpdated, handler).unwrap();
        assert!(sub.is_active());
        sub.unsubscribe();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bus.receiver_count(&Topic::LeadUpdated), 0);
        bus.emit(&Topic::LeadUpdated, json!({}), None);
        assert!(rx.recv().await.is_none(), "handler dropped with the task");
        assert_eq!(bus.prune(), 1);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_oldest_events() {
        let bus = EventBus::new(2);
        let topic = Topic::Agent("a1".into());
        let (handler, mut rx) = collector();
        let _sub = bus.subscribe(topic.clone(), handler).unwrap();

        // The handler task cannot run until this test yields.
        for seq in 1..=5 {
            bus.emit(&topic, json!({}), Some(seq));
        }
        assert_eq!(next(&mut rx).await.seq, Some(4));
        assert_eq!(next(&mut rx).await.seq, Some(5));
        assert_eq!(bus.dropped_events(), 3);
    }

    #[tokio::test]
    async fn closed_bus_rejects_publish_and_subscribe() {
        let bus = EventBus::new(8);
        let (handler, _rx) = collector();
        let sub = bus.subscribe(Topic::LeadNew, handler).unwrap();

        bus.shutdown().await.unwrap();
        assert!(matches!(
            bus.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        assert!(bus.publish(&Topic::LeadNew, json!({}), None).await.is_err());
        assert!(bus.subscribe(Topic::LeadNew, |_| {}).is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn publish_reports_receiver_count() {
        let bus = EventBus::new(8);
        let (h1, _r1) = collector();
        let (h2, _r2) = collector();
        let _s1 = bus.subscribe(Topic::ConversationNew, h1).unwrap();
        let _s2 = bus.subscribe(Topic::ConversationNew, h2).unwrap();
        let reached = bus
            .publish(&Topic::ConversationNew, json!({}), None)
            .await
            .unwrap();
        assert_eq!(reached, 2);
    }
}
