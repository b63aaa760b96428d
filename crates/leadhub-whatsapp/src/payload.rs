// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payload decoding and normalization.
//!
//! The provider delivers either a flat `{messages, statuses, contacts}` body
//! or the full `{entry: [{changes: [{value: {...}}]}]}` envelope. Decoding
//! tries the flat shape first, then the envelope, and otherwise gives up
//! with `None`. Individual elements that fail to decode are skipped so one
//! malformed message never hides its siblings.

use std::str::FromStr;

use leadhub_core::{
    InboundMessage, MessageStatus, MessageType, ProviderEvent, StatusUpdate, normalize_phone,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Recognized top-level payload shapes.
#[derive(Debug)]
enum PayloadShape {
    Flat(ChangeValue),
    Nested(Vec<ChangeValue>),
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<Value>,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    statuses: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: ChangeValue,
}

#[derive(Debug, Deserialize)]
struct Contact {
    wa_id: String,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    from: String,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<TextBody>,
    #[serde(default)]
    image: Option<Media>,
    #[serde(default)]
    video: Option<Media>,
    #[serde(default)]
    document: Option<Media>,
    #[serde(default)]
    audio: Option<Media>,
    #[serde(default)]
    sticker: Option<Media>,
    #[serde(default)]
    button: Option<Button>,
    #[serde(default)]
    interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Button {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Interactive {
    #[serde(default)]
    button_reply: Option<Reply>,
    #[serde(default)]
    list_reply: Option<Reply>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    id: String,
    status: String,
    #[serde(default)]
    recipient_id: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn sniff(payload: &Value) -> Option<PayloadShape> {
    let object = payload.as_object()?;
    if object.contains_key("messages") || object.contains_key("statuses") {
        match ChangeValue::deserialize(payload) {
            Ok(value) => return Some(PayloadShape::Flat(value)),
            Err(e) => debug!(error = %e, "flat webhook shape did not decode, trying entry"),
        }
    }
    if let Some(entries) = object.get("entry").and_then(Value::as_array) {
        let values = entries
            .iter()
            .filter_map(|entry| decode_element::<Entry>(entry, "entry"))
            .flat_map(|entry| entry.changes)
            .filter_map(|change| decode_element::<Change>(&change, "change"))
            .map(|change| change.value)
            .collect();
        return Some(PayloadShape::Nested(values));
    }
    None
}

fn decode_element<T: DeserializeOwned>(value: &Value, what: &'static str) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(element = what, error = %e, "skipping undecodable webhook element");
            None
        }
    }
}

/// Decode every message and status event in a webhook body.
///
/// Returns `None` when the body matches neither known shape.
pub fn decode_events(payload: &Value) -> Option<Vec<ProviderEvent>> {
    let values = match sniff(payload)? {
        PayloadShape::Flat(value) => vec![value],
        PayloadShape::Nested(values) => values,
    };

    let mut events = Vec::new();
    for value in &values {
        let contacts: Vec<Contact> = value
            .contacts
            .iter()
            .filter_map(|c| decode_element(c, "contact"))
            .collect();
        events.extend(
            value
                .messages
                .iter()
                .filter_map(|m| decode_element::<WireMessage>(m, "message"))
                .filter_map(|m| inbound_from_wire(m, &contacts))
                .map(ProviderEvent::Message),
        );
        events.extend(
            value
                .statuses
                .iter()
                .filter_map(|s| decode_element::<WireStatus>(s, "status"))
                .filter_map(status_from_wire)
                .map(ProviderEvent::Status),
        );
    }
    Some(events)
}

/// The first inbound message in a webhook body, if any.
pub fn normalize_inbound(payload: &Value) -> Option<InboundMessage> {
    decode_events(payload)?.into_iter().find_map(|event| match event {
        ProviderEvent::Message(m) => Some(m),
        ProviderEvent::Status(_) => None,
    })
}

/// The first status update in a webhook body, if any.
pub fn normalize_status(payload: &Value) -> Option<StatusUpdate> {
    decode_events(payload)?.into_iter().find_map(|event| match event {
        ProviderEvent::Status(s) => Some(s),
        ProviderEvent::Message(_) => None,
    })
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn epoch_seconds(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn inbound_from_wire(message: WireMessage, contacts: &[Contact]) -> Option<InboundMessage> {
    let from = normalize_phone(&message.from);
    if message.id.is_empty() || from.is_empty() {
        debug!(id = %message.id, "message without id or sender skipped");
        return None;
    }
    let raw_kind = message.kind.clone().unwrap_or_else(|| "text".to_string());
    let message_type = MessageType::from_provider(&raw_kind);

    let caption = [
        &message.image,
        &message.video,
        &message.document,
        &message.audio,
        &message.sticker,
    ]
    .into_iter()
    .flatten()
    .find_map(|media| non_empty(media.caption.clone()));

    let reply_title = message.interactive.as_ref().and_then(|i| {
        i.button_reply
            .as_ref()
            .or(i.list_reply.as_ref())
            .and_then(|reply| non_empty(reply.title.clone()))
    });

    let text = non_empty(message.text.and_then(|t| t.body))
        .or(caption)
        .or_else(|| non_empty(message.button.and_then(|b| b.text)))
        .or(reply_title)
        .unwrap_or_else(|| format!("[{raw_kind}]"));

    let profile_name = contacts
        .iter()
        .find(|c| normalize_phone(&c.wa_id) == from)
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| non_empty(p.name.clone()));

    Some(InboundMessage {
        provider_message_id: message.id,
        from,
        profile_name,
        message_type,
        text,
        timestamp: epoch_seconds(message.timestamp.as_ref()),
    })
}

fn status_from_wire(status: WireStatus) -> Option<StatusUpdate> {
    let Ok(parsed) = MessageStatus::from_str(&status.status) else {
        debug!(id = %status.id, status = %status.status, "unrecognized delivery status skipped");
        return None;
    };
    if status.id.is_empty() {
        return None;
    }
    let error = status.errors.first().map(|e| {
        let detail = e
            .message
            .clone()
            .or_else(|| e.title.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        match e.code {
            Some(code) => format!("{code}: {detail}"),
            None => detail,
        }
    });
    Some(StatusUpdate {
        provider_message_id: status.id,
        status: parsed,
        recipient_id: status.recipient_id.map(|r| normalize_phone(&r)),
        timestamp: epoch_seconds(status.timestamp.as_ref()),
        error,
    })
}
