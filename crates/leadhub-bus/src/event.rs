// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use leadhub_core::{Topic, now_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One published realtime event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Wire name of the topic, e.g. `conversation:abc:message`.
    pub topic: String,
    /// Conversation version at publish time, when the event concerns one.
    pub seq: Option<i64>,
    pub payload: Value,
    pub emitted_at: String,
}

impl Event {
    pub fn new(topic: &Topic, payload: Value, seq: Option<i64>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            seq,
            payload,
            emitted_at: now_timestamp(),
        }
    }

    /// Server frame sent to realtime clients: `{"event", "data", "seq"}`.
    pub fn frame(&self) -> Value {
        json!({
            "event": self.topic,
            "data": self.payload,
            "seq": self.seq,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uses_topic_wire_name() {
        let event = Event::new(
            &Topic::ConversationMessage("c1".into()),
            json!({"text": "Olá"}),
            Some(4),
        );
        assert_eq!(
            event.frame(),
            json!({"event": "conversation:c1:message", "data": {"text": "Olá"}, "seq": 4})
        );
    }

    #[test]
    fn frame_without_seq_is_null() {
        let event = Event::new(&Topic::LeadNew, json!({}), None);
        assert_eq!(event.frame()["seq"], Value::Null);
    }
}
