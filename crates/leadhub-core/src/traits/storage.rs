// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits for the relational store.
//!
//! The store is split into the component contracts the pipeline depends on.
//! [`StorageAdapter`] bundles them with lifecycle so one backend can be
//! injected everywhere as `Arc<dyn StorageAdapter>`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::LeadhubError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Agent, AgentLoad, AppendOutcome, Channel, Claim, CloseReason, Conversation,
    ConversationFilter, ConversationLookup, ConversationStatus, DeadLetter, InboundMessage,
    Interaction, Lead, LeadProfile, Message, OutboundDraft, Pipeline, Resolution,
    StatusApplication, StatusUpdate,
};

/// Leads and conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Finds a lead by phone or creates it. Returns the lead and whether it was created.
    async fn upsert_lead(&self, profile: LeadProfile) -> Result<(Lead, bool), LeadhubError>;

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, LeadhubError>;

    /// Unassigned leads whose status is in `statuses`, oldest first.
    async fn list_leads_for_assignment(
        &self,
        statuses: &[String],
        limit: i64,
    ) -> Result<Vec<Lead>, LeadhubError>;

    /// Claims an unassigned lead for `agent_id`.
    ///
    /// When the lead is still in the initial stage it moves to `next_status`.
    async fn assign_lead(
        &self,
        lead_id: &str,
        agent_id: &str,
        next_status: &str,
    ) -> Result<Claim<Lead>, LeadhubError>;

    /// The non-closed conversation for a lead (by id or phone) on `channel`.
    async fn find_open_conversation(
        &self,
        lookup: ConversationLookup,
        channel: Channel,
    ) -> Result<Option<Conversation>, LeadhubError>;

    /// Creates an `open` conversation. Fails with `Conflict` when one is already open.
    async fn create_conversation(
        &self,
        lead_id: &str,
        channel: Channel,
        initial_assignee: Option<String>,
    ) -> Result<Conversation, LeadhubError>;

    /// Resolves an inbound sender to its open conversation, creating lead and
    /// conversation as needed. Concurrent callers for one phone converge.
    async fn resolve_inbound_conversation(
        &self,
        phone: &str,
        channel: Channel,
        profile_name: Option<&str>,
        default_pipeline: Pipeline,
    ) -> Result<Resolution, LeadhubError>;

    /// Like `resolve_inbound_conversation`, keyed by the message sender, but
    /// returns `None` and writes nothing when the provider message id is
    /// already stored.
    async fn resolve_inbound_message(
        &self,
        message: &InboundMessage,
        channel: Channel,
        default_pipeline: Pipeline,
    ) -> Result<Option<Resolution>, LeadhubError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, LeadhubError>;

    async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, LeadhubError>;

    /// Non-closed conversations with no owner, oldest first.
    async fn list_unassigned_conversations(
        &self,
        limit: i64,
    ) -> Result<Vec<Conversation>, LeadhubError>;

    /// Claims an unassigned, non-closed conversation and moves it from `open` to `active`.
    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<Claim<Conversation>, LeadhubError>;

    /// Applies a validated lifecycle transition. `reason` is required for `closed`.
    async fn update_conversation_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
        reason: Option<CloseReason>,
    ) -> Result<Conversation, LeadhubError>;

    /// Resets the unread counter.
    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, LeadhubError>;
}

/// Messages within conversations.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Idempotently appends an inbound message keyed by its provider id.
    async fn append_inbound(
        &self,
        conversation_id: &str,
        message: &InboundMessage,
    ) -> Result<AppendOutcome, LeadhubError>;

    /// Appends an outbound message (sent or failed).
    async fn append_outbound(&self, draft: OutboundDraft) -> Result<AppendOutcome, LeadhubError>;

    /// Applies a delivery status. `None` when the provider id is unknown.
    async fn apply_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<Option<StatusApplication>, LeadhubError>;

    async fn get_message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, LeadhubError>;

    /// Messages of one conversation ordered by `sent_at`, then insertion.
    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, LeadhubError>;
}

/// Agents and their derived load.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn upsert_agent(&self, agent: &Agent) -> Result<(), LeadhubError>;

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, LeadhubError>;

    /// Active agents holding `role`.
    async fn list_active_agents_by_role(&self, role: &str) -> Result<Vec<Agent>, LeadhubError>;

    /// Active agents among `ids`. Unknown ids are skipped.
    async fn list_active_agents_by_ids(&self, ids: &[String])
    -> Result<Vec<Agent>, LeadhubError>;

    async fn set_agent_online(&self, id: &str, online: bool) -> Result<(), LeadhubError>;

    /// Current load of every agent in `ids`, computed in one read.
    async fn agent_loads(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, AgentLoad>, LeadhubError>;
}

/// Key-value settings rows.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, LeadhubError>;

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), LeadhubError>;
}

/// Audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_interaction(&self, interaction: &Interaction) -> Result<(), LeadhubError>;

    async fn list_interactions(&self, lead_id: &str) -> Result<Vec<Interaction>, LeadhubError>;
}

/// Events that exhausted their retries.
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    async fn record_dead_letter(&self, letter: &DeadLetter) -> Result<(), LeadhubError>;

    async fn list_dead_letters(
        &self,
        include_resolved: bool,
    ) -> Result<Vec<DeadLetter>, LeadhubError>;

    async fn resolve_dead_letter(&self, id: &str) -> Result<(), LeadhubError>;
}

/// A complete storage backend with lifecycle.
#[async_trait]
pub trait StorageAdapter:
    PluginAdapter
    + ConversationRepository
    + MessageStore
    + AgentDirectory
    + SettingsStore
    + AuditLog
    + DeadLetterQueue
{
    /// Runs migrations and prepares the backend.
    async fn initialize(&self) -> Result<(), LeadhubError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), LeadhubError>;
}
