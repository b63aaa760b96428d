// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side topic registrations that survive reconnects.
//!
//! A realtime client records which topics it cares about here. Each time it
//! connects, every registered topic is armed against the new connection; the
//! previous connection's subscriptions are dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use leadhub_core::{LeadhubError, Topic};
use tracing::debug;

use crate::bus::{EventBus, Subscription};
use crate::event::Event;

/// Shared event callback.
pub type EventHandler = Arc<dyn Fn(Arc<Event>) + Send + Sync>;

#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: BTreeMap<Topic, EventHandler>,
    active: HashMap<Topic, Subscription>,
    bus: Option<Arc<EventBus>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, replacing any previous handler.
    ///
    /// When connected the topic is armed immediately. Returns true if the
    /// topic was not registered before.
    pub fn register<H>(&mut self, topic: Topic, handler: H) -> Result<bool, LeadhubError>
    where
        H: Fn(Arc<Event>) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        let is_new = self.handlers.insert(topic.clone(), handler.clone()).is_none();
        if let Some(bus) = &self.bus {
            let sub = arm(bus, topic.clone(), handler)?;
            self.active.insert(topic, sub);
        }
        Ok(is_new)
    }

    /// Forget `topic`. Returns true if it was registered.
    pub fn unregister(&mut self, topic: &Topic) -> bool {
        self.active.remove(topic);
        self.handlers.remove(topic).is_some()
    }

    /// Attach to `bus`, re-arming every registered topic. Returns how many
    /// topics were armed.
    pub fn connect(&mut self, bus: Arc<EventBus>) -> Result<usize, LeadhubError> {
        self.active.clear();
        for (topic, handler) in &self.handlers {
            let sub = arm(&bus, topic.clone(), handler.clone())?;
            self.active.insert(topic.clone(), sub);
        }
        debug!(topics = self.active.len(), "subscriptions re-armed");
        self.bus = Some(bus);
        Ok(self.active.len())
    }

    /// Drop live subscriptions but keep the registrations.
    pub fn disconnect(&mut self) {
        self.active.clear();
        self.bus = None;
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    pub fn is_armed(&self, topic: &Topic) -> bool {
        self.active.get(topic).is_some_and(Subscription::is_active)
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn arm(bus: &EventBus, topic: Topic, handler: EventHandler) -> Result<Subscription, LeadhubError> {
    bus.subscribe(topic, move |event| handler(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn forwarder(tx: &mpsc::UnboundedSender<String>) -> impl Fn(Arc<Event>) + Send + Sync + 'static {
        let tx = tx.clone();
        move |event| {
            let _ = tx.send(event.topic.clone());
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn registrations_before_connect_are_armed_on_connect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.register(Topic::QueueUpdate, forwarder(&tx)).unwrap());
        assert!(!registry.is_armed(&Topic::QueueUpdate));

        let bus = Arc::new(EventBus::new(8));
        assert_eq!(registry.connect(bus.clone()).unwrap(), 1);
        bus.emit(&Topic::QueueUpdate, json!({}), None);
        assert_eq!(next(&mut rx).await, "queue:update");
    }

    #[tokio::test]
    async fn reconnect_rearms_every_topic_against_new_connection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = SubscriptionRegistry::new();
        let first = Arc::new(EventBus::new(8));
        registry.connect(first.clone()).unwrap();
        registry
            .register(Topic::ConversationMessage("c1".into()), forwarder(&tx))
            .unwrap();
        registry.register(Topic::Agent("a1".into()), forwarder(&tx)).unwrap();

        registry.disconnect();
        assert_eq!(registry.len(), 2);

        let second = Arc::new(EventBus::new(8));
        assert_eq!(registry.connect(second.clone()).unwrap(), 2);
        assert!(registry.is_armed(&Topic::Agent("a1".into())));

        second.emit(&Topic::Agent("a1".into()), json!({}), None);
        assert_eq!(next(&mut rx).await, "agent:a1");
        second.emit(&Topic::ConversationMessage("c1".into()), json!({}), None);
        assert_eq!(next(&mut rx).await, "conversation:c1:message");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(first.emit(&Topic::Agent("a1".into()), json!({}), None), 0);
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bus = Arc::new(EventBus::new(8));
        let mut registry = SubscriptionRegistry::new();
        registry.connect(bus.clone()).unwrap();
        registry.register(Topic::LeadNew, forwarder(&tx)).unwrap();
        registry.register(Topic::LeadUpdated, forwarder(&tx)).unwrap();

        assert!(registry.unregister(&Topic::LeadNew));
        assert!(!registry.unregister(&Topic::LeadNew));
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.emit(&Topic::LeadNew, json!({}), None);
        bus.emit(&Topic::LeadUpdated, json!({}), None);
        assert_eq!(next(&mut rx).await, "lead:updated");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn re_registering_replaces_handler() {
        let bus = Arc::new(EventBus::new(8));
        let mut registry = SubscriptionRegistry::new();
        registry.connect(bus.clone()).unwrap();
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        assert!(registry.register(Topic::QueueUpdate, forwarder(&old_tx)).unwrap());
        assert!(!registry.register(Topic::QueueUpdate, forwarder(&new_tx)).unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.emit(&Topic::QueueUpdate, json!({}), None);
        assert_eq!(next(&mut new_rx).await, "queue:update");
        assert!(old_rx.try_recv().is_err());
    }
}
