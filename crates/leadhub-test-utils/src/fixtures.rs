// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook bodies and domain rows for tests.

use leadhub_core::{Agent, Pipeline};
use serde_json::{Value, json};

/// Wrap a change `value` in the provider's `entry[].changes[]` envelope.
pub fn envelope(value: Value) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-test",
            "changes": [{"field": "messages", "value": value}]
        }]
    })
}

/// A nested webhook carrying one inbound text message.
pub fn text_webhook(from: &str, profile_name: &str, message_id: &str, body: &str) -> Value {
    envelope(json!({
        "messaging_product": "whatsapp",
        "contacts": [{"wa_id": from, "profile": {"name": profile_name}}],
        "messages": [{
            "id": message_id,
            "from": from,
            "timestamp": "1717000000",
            "type": "text",
            "text": {"body": body}
        }]
    }))
}

/// A nested webhook carrying one delivery status.
pub fn status_webhook(message_id: &str, status: &str) -> Value {
    envelope(json!({
        "messaging_product": "whatsapp",
        "statuses": [{
            "id": message_id,
            "status": status,
            "recipient_id": "5511999990000",
            "timestamp": "1717000100"
        }]
    }))
}

/// An active, online agent with unlimited capacity.
pub fn agent(id: &str, role: &str) -> Agent {
    Agent {
        id: id.to_string(),
        name: id.to_uppercase(),
        role: role.to_string(),
        active: true,
        online: true,
        pipeline: Some(Pipeline::HighTicket),
        max_concurrent_chats: None,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

/// `leadDistribution` row enabling automatic assignment.
pub const AUTO_DISTRIBUTION: &str = r#"{"enabled":true,"mode":"auto","loadMetric":"open_conversations"}"#;

/// `leadDistribution` row with distribution switched off.
pub const DISABLED_DISTRIBUTION: &str = r#"{"enabled":false,"mode":"auto"}"#;
