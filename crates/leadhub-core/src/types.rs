// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, provider, assignment, and fanout crates.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp format used for every persisted and published timestamp.
///
/// Fixed-width UTC so that lexicographic order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Format a UTC instant in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Canonical digits-only phone form. Idempotent.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Provider,
    Fanout,
}

/// Sales pipeline a lead belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Pipeline {
    #[default]
    HighTicket,
    LowTicket,
}

impl Pipeline {
    /// Stage every new lead starts in.
    pub const INITIAL_STAGE: &'static str = "novo";

    /// Role whose holders close deals in this pipeline.
    pub fn closer_role(self) -> &'static str {
        match self {
            Pipeline::HighTicket => "closer_ht",
            Pipeline::LowTicket => "closer_lt",
        }
    }

    /// Stage a lead moves to once an agent owns it.
    pub fn stage_after_assignment(self) -> &'static str {
        match self {
            Pipeline::HighTicket => "qualificado",
            Pipeline::LowTicket => "atribuido",
        }
    }
}

/// Messaging channel of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    #[default]
    Whatsapp,
    Instagram,
    Email,
}

/// Lifecycle state of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Open,
    Active,
    OnHold,
    Closed,
}

impl ConversationStatus {
    pub fn is_closed(self) -> bool {
        self == ConversationStatus::Closed
    }

    /// Allowed lifecycle edges. Closed is terminal.
    ///
    /// ```text
    /// open -> active -> on_hold -> active
    ///   \________\_________\_____> closed
    /// ```
    pub fn can_transition_to(self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, next),
            (Open, Active)
                | (Active, OnHold)
                | (OnHold, Active)
                | (Open, Closed)
                | (Active, Closed)
                | (OnHold, Closed)
        )
    }
}

/// Terminal resolution recorded when a conversation closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CloseReason {
    Payment,
    NoInterest,
    Transferred,
    Resolved,
    Timeout,
}

/// Whether a message came from the lead or went out to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// Content type of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    Document,
    Sticker,
    Location,
    Template,
    Other,
}

impl MessageType {
    /// Map a provider `type` string. Quick-reply buttons and interactive replies carry text.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "text" | "button" | "interactive" => MessageType::Text,
            "image" => MessageType::Image,
            "audio" | "voice" => MessageType::Audio,
            "video" => MessageType::Video,
            "document" => MessageType::Document,
            "sticker" => MessageType::Sticker,
            "location" => MessageType::Location,
            "template" => MessageType::Template,
            _ => MessageType::Other,
        }
    }
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageStatus {
    Received,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    fn rank(self) -> u8 {
        match self {
            MessageStatus::Received | MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
            MessageStatus::Failed => 3,
        }
    }

    /// Whether a status event carrying `next` should overwrite `self`.
    ///
    /// Delivery receipts only move forward; a late `delivered` never downgrades a
    /// `read`. `failed` wins over anything except `read`.
    pub fn accepts(self, next: MessageStatus) -> bool {
        match (self, next) {
            (MessageStatus::Read, MessageStatus::Failed) => false,
            (MessageStatus::Failed, _) => false,
            (current, next) => next.rank() > current.rank(),
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Lead,
    Agent(String),
}

impl Sender {
    /// Compact column form: `lead` or `agent:<id>`.
    pub fn to_column(&self) -> String {
        match self {
            Sender::Lead => "lead".to_string(),
            Sender::Agent(id) => format!("agent:{id}"),
        }
    }

    pub fn from_column(raw: &str) -> Self {
        match raw.strip_prefix("agent:") {
            Some(id) => Sender::Agent(id.to_string()),
            None => Sender::Lead,
        }
    }
}

/// A prospective or existing contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    /// Digits-only; unique across leads.
    pub phone: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub pipeline: Pipeline,
    pub status: String,
    pub source: String,
    pub estimated_value: Option<f64>,
    pub tags: BTreeSet<String>,
    pub assigned_to: Option<String>,
    pub assigned_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields used to find-or-create a lead by phone.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadProfile {
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub pipeline: Pipeline,
    pub source: String,
}

impl LeadProfile {
    /// Profile for a contact first seen on an inbound channel.
    pub fn inbound(phone: &str, name: Option<&str>, pipeline: Pipeline, channel: Channel) -> Self {
        Self {
            phone: normalize_phone(phone),
            name: name.map(str::to_string),
            email: None,
            company: None,
            pipeline,
            source: channel.to_string(),
        }
    }
}

/// Denormalized preview of the newest message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    pub direction: Direction,
    pub at: String,
}

/// Ongoing dialogue with a lead over one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub lead_id: String,
    pub lead_name: String,
    pub phone: String,
    pub channel: Channel,
    pub status: ConversationStatus,
    pub assigned_to: Option<String>,
    pub unread_count: i64,
    pub last_message: Option<LastMessage>,
    pub pipeline: Pipeline,
    /// Incremented on every mutation; published as the event sequence number.
    pub version: i64,
    pub close_reason: Option<CloseReason>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One inbound or outbound unit within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub provider_message_id: Option<String>,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub status: MessageStatus,
    pub sender: Sender,
    pub error: Option<String>,
    /// Provider timestamp when known, otherwise receipt time.
    pub sent_at: String,
    pub created_at: String,
}

/// A human agent that conversations and leads are distributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: String,
    pub active: bool,
    pub online: bool,
    pub pipeline: Option<Pipeline>,
    /// Capacity in open conversations. `None` means unlimited.
    pub max_concurrent_chats: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether distribution happens automatically or only by hand.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistributionMode {
    Auto,
    #[default]
    Manual,
}

/// How an agent's current load is measured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoadMetric {
    /// Non-closed conversations currently assigned.
    #[default]
    OpenConversations,
    /// Leads assigned since local midnight.
    AssignedToday,
}

/// Distribution policy stored in the `leadDistribution` settings row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributionSettings {
    pub enabled: bool,
    pub mode: DistributionMode,
    pub participants: Vec<String>,
    pub load_metric: LoadMetric,
}

impl DistributionSettings {
    /// Key of the settings row holding this policy.
    pub const SETTINGS_KEY: &'static str = "leadDistribution";

    /// Decode the settings row. Absent or malformed rows yield the disabled default.
    pub fn from_setting(raw: Option<&str>) -> Self {
        match raw {
            None => Self::default(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "malformed leadDistribution setting, distribution disabled");
                Self::default()
            }),
        }
    }

    /// Whether automatic assignment may run at all.
    pub fn is_automatic(&self) -> bool {
        self.enabled && self.mode == DistributionMode::Auto
    }
}

/// Canonical inbound message produced by the provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub provider_message_id: String,
    /// Sender phone, digits-only.
    pub from: String,
    pub profile_name: Option<String>,
    pub message_type: MessageType,
    /// Never empty: falls back to a `[type]` placeholder.
    pub text: String,
    /// Provider epoch seconds.
    pub timestamp: Option<i64>,
}

impl InboundMessage {
    /// Provider timestamp as a formatted instant, if present and valid.
    pub fn sent_at(&self) -> Option<String> {
        self.timestamp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(format_timestamp)
    }
}

/// Canonical delivery-status event produced by the provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub provider_message_id: String,
    pub status: MessageStatus,
    pub recipient_id: Option<String>,
    pub timestamp: Option<i64>,
    pub error: Option<String>,
}

/// One normalized provider event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderEvent {
    Message(InboundMessage),
    Status(StatusUpdate),
}

impl ProviderEvent {
    pub fn provider_message_id(&self) -> &str {
        match self {
            ProviderEvent::Message(m) => &m.provider_message_id,
            ProviderEvent::Status(s) => &s.provider_message_id,
        }
    }
}

/// Result of a successful provider send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub provider_message_id: String,
}

/// An outbound message to persist after (or instead of) a provider send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundDraft {
    pub conversation_id: String,
    pub text: String,
    pub message_type: MessageType,
    pub sender: Sender,
    pub provider_message_id: Option<String>,
    pub status: MessageStatus,
    pub error: Option<String>,
}

/// Outcome of an idempotent inbound append.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// A new row was written and the conversation snapshot updated.
    Inserted {
        message: Message,
        conversation: Conversation,
    },
    /// The provider message id was already stored; nothing changed.
    Duplicate { message: Message },
}

impl AppendOutcome {
    pub fn message(&self) -> &Message {
        match self {
            AppendOutcome::Inserted { message, .. } | AppendOutcome::Duplicate { message } => {
                message
            }
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppendOutcome::Duplicate { .. })
    }
}

/// Result of applying a delivery status to a stored message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusApplication {
    pub message: Message,
    /// False when the event was stale or repeated and nothing was written.
    pub changed: bool,
    /// Version of the owning conversation, bumped when the status changed.
    pub conversation_version: i64,
}

/// Outcome of a conditional ownership claim on a lead or conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim<T> {
    /// The claim was written; `T` is the updated row.
    Assigned(T),
    /// Another writer owned the row first; `T` is the current row.
    AlreadyAssigned(T),
}

impl<T> Claim<T> {
    pub fn into_inner(self) -> T {
        match self {
            Claim::Assigned(t) | Claim::AlreadyAssigned(t) => t,
        }
    }
}

/// Load figures for one agent, read together in a single query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentLoad {
    pub open_conversations: i64,
    pub assigned_today: i64,
}

impl AgentLoad {
    pub fn by(&self, metric: LoadMetric) -> i64 {
        match metric {
            LoadMetric::OpenConversations => self.open_conversations,
            LoadMetric::AssignedToday => self.assigned_today,
        }
    }
}

/// Result of resolving an inbound sender to a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub lead: Lead,
    pub conversation: Conversation,
    pub lead_created: bool,
    pub conversation_created: bool,
}

/// Key used to look up an open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationLookup {
    LeadId(String),
    Phone(String),
}

/// Filter for conversation listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilter {
    pub assigned_to: Option<String>,
    pub unassigned_only: bool,
    pub include_closed: bool,
    pub limit: Option<i64>,
}

/// Kind of audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InteractionKind {
    Assignment,
    StatusChange,
}

/// Audit trail entry attached to a lead and/or conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub lead_id: Option<String>,
    pub conversation_id: Option<String>,
    pub kind: InteractionKind,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

impl Interaction {
    pub fn new(
        kind: InteractionKind,
        lead_id: Option<String>,
        conversation_id: Option<String>,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id,
            conversation_id,
            kind,
            description: description.into(),
            metadata,
            created_at: now_timestamp(),
        }
    }
}

/// Pipeline stage at which an event exhausted its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeadLetterStage {
    Store,
    Publish,
    Send,
}

/// An event set aside for manual inspection after exhausting retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: String,
    pub stage: DeadLetterStage,
    pub payload: serde_json::Value,
    pub error: String,
    pub attempts: u32,
    pub resolved: bool,
    pub created_at: String,
}

impl DeadLetter {
    pub fn new(
        stage: DeadLetterStage,
        payload: serde_json::Value,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stage,
            payload,
            error: error.into(),
            attempts,
            resolved: false,
            created_at: now_timestamp(),
        }
    }
}
