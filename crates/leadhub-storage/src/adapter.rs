// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use leadhub_config::model::StorageConfig;
use leadhub_core::{
    AdapterType, Agent, AgentDirectory, AgentLoad, AppendOutcome, AuditLog, Channel, Claim,
    CloseReason, Conversation, ConversationFilter, ConversationLookup, ConversationRepository,
    ConversationStatus, DeadLetter, DeadLetterQueue, HealthStatus, InboundMessage, Interaction,
    Lead, LeadProfile, LeadhubError, Message, MessageStore, OutboundDraft, Pipeline,
    PluginAdapter, Resolution, SettingsStore, StatusApplication, StatusUpdate, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. Nothing is opened until `initialize`.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database (used by tests with in-memory databases).
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, LeadhubError> {
        self.db.get().ok_or_else(|| LeadhubError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadhubError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadhubError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationRepository for SqliteStorage {
    async fn upsert_lead(&self, profile: LeadProfile) -> Result<(Lead, bool), LeadhubError> {
        queries::leads::upsert_lead(self.db()?, profile).await
    }

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, LeadhubError> {
        queries::leads::get_lead(self.db()?, id).await
    }

    async fn list_leads_for_assignment(
        &self,
        statuses: &[String],
        limit: i64,
    ) -> Result<Vec<Lead>, LeadhubError> {
        queries::leads::list_leads_for_assignment(self.db()?, statuses, limit).await
    }

    async fn assign_lead(
        &self,
        lead_id: &str,
        agent_id: &str,
        next_status: &str,
    ) -> Result<Claim<Lead>, LeadhubError> {
        queries::leads::assign_lead(self.db()?, lead_id, agent_id, next_status).await
    }

    async fn find_open_conversation(
        &self,
        lookup: ConversationLookup,
        channel: Channel,
    ) -> Result<Option<Conversation>, LeadhubError> {
        queries::conversations::find_open_conversation(self.db()?, lookup, channel).await
    }

    async fn create_conversation(
        &self,
        lead_id: &str,
        channel: Channel,
        initial_assignee: Option<String>,
    ) -> Result<Conversation, LeadhubError> {
        queries::conversations::create_conversation(self.db()?, lead_id, channel, initial_assignee)
            .await
    }

    async fn resolve_inbound_conversation(
        &self,
        phone: &str,
        channel: Channel,
        profile_name: Option<&str>,
        default_pipeline: Pipeline,
    ) -> Result<Resolution, LeadhubError> {
        queries::conversations::resolve_inbound_conversation(
            self.db()?,
            phone,
            channel,
            profile_name,
            default_pipeline,
        )
        .await
    }

    async fn resolve_inbound_message(
        &self,
        message: &InboundMessage,
        channel: Channel,
        default_pipeline: Pipeline,
    ) -> Result<Option<Resolution>, LeadhubError> {
        queries::conversations::resolve_inbound_message(
            self.db()?,
            message,
            channel,
            default_pipeline,
        )
        .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, LeadhubError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, LeadhubError> {
        queries::conversations::list_conversations(self.db()?, filter).await
    }

    async fn list_unassigned_conversations(
        &self,
        limit: i64,
    ) -> Result<Vec<Conversation>, LeadhubError> {
        queries::conversations::list_unassigned_conversations(self.db()?, limit).await
    }

    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<Claim<Conversation>, LeadhubError> {
        queries::conversations::assign_conversation(self.db()?, conversation_id, agent_id).await
    }

    async fn update_conversation_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
        reason: Option<CloseReason>,
    ) -> Result<Conversation, LeadhubError> {
        queries::conversations::update_conversation_status(
            self.db()?,
            conversation_id,
            status,
            reason,
        )
        .await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, LeadhubError> {
        queries::conversations::mark_conversation_read(self.db()?, conversation_id).await
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn append_inbound(
        &self,
        conversation_id: &str,
        message: &InboundMessage,
    ) -> Result<AppendOutcome, LeadhubError> {
        queries::messages::append_inbound(self.db()?, conversation_id, message).await
    }

    async fn append_outbound(&self, draft: OutboundDraft) -> Result<AppendOutcome, LeadhubError> {
        queries::messages::append_outbound(self.db()?, draft).await
    }

    async fn apply_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<Option<StatusApplication>, LeadhubError> {
        queries::messages::apply_status(self.db()?, update).await
    }

    async fn get_message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, LeadhubError> {
        queries::messages::get_message_by_provider_id(self.db()?, provider_message_id).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, LeadhubError> {
        queries::messages::list_messages(self.db()?, conversation_id, limit).await
    }
}

#[async_trait]
impl AgentDirectory for SqliteStorage {
    async fn upsert_agent(&self, agent: &Agent) -> Result<(), LeadhubError> {
        queries::agents::upsert_agent(self.db()?, agent).await
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, LeadhubError> {
        queries::agents::get_agent(self.db()?, id).await
    }

    async fn list_active_agents_by_role(&self, role: &str) -> Result<Vec<Agent>, LeadhubError> {
        queries::agents::list_active_agents_by_role(self.db()?, role).await
    }

    async fn list_active_agents_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<Agent>, LeadhubError> {
        queries::agents::list_active_agents_by_ids(self.db()?, ids).await
    }

    async fn set_agent_online(&self, id: &str, online: bool) -> Result<(), LeadhubError> {
        queries::agents::set_agent_online(self.db()?, id, online).await
    }

    async fn agent_loads(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, AgentLoad>, LeadhubError> {
        queries::agents::agent_loads(self.db()?, ids).await
    }
}

#[async_trait]
impl SettingsStore for SqliteStorage {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, LeadhubError> {
        queries::settings::get_setting(self.db()?, key).await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), LeadhubError> {
        queries::settings::put_setting(self.db()?, key, value).await
    }
}

#[async_trait]
impl AuditLog for SqliteStorage {
    async fn record_interaction(&self, interaction: &Interaction) -> Result<(), LeadhubError> {
        queries::audit::record_interaction(self.db()?, interaction).await
    }

    async fn list_interactions(&self, lead_id: &str) -> Result<Vec<Interaction>, LeadhubError> {
        queries::audit::list_interactions(self.db()?, lead_id).await
    }
}

#[async_trait]
impl DeadLetterQueue for SqliteStorage {
    async fn record_dead_letter(&self, letter: &DeadLetter) -> Result<(), LeadhubError> {
        queries::dead_letters::record_dead_letter(self.db()?, letter).await
    }

    async fn list_dead_letters(
        &self,
        include_resolved: bool,
    ) -> Result<Vec<DeadLetter>, LeadhubError> {
        queries::dead_letters::list_dead_letters(self.db()?, include_resolved).await
    }

    async fn resolve_dead_letter(&self, id: &str) -> Result<(), LeadhubError> {
        queries::dead_letters::resolve_dead_letter(self.db()?, id).await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LeadhubError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LeadhubError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LeadhubError> {
        let db = self.db()?;
        if self.config.wal_mode {
            db.checkpoint().await?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn identity() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(storage.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn uninitialized_storage_reports_unhealthy_and_errors() {
        let storage = SqliteStorage::new(make_config("never.db"));
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        assert!(storage.get_lead("x").await.is_err());
    }

    #[tokio::test]
    async fn new_lead_inbound_scenario_through_trait_object() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("scenario.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let resolution = storage
            .resolve_inbound_conversation(
                "5511999990000",
                Channel::Whatsapp,
                None,
                Pipeline::HighTicket,
            )
            .await
            .unwrap();
        let inbound = InboundMessage {
            provider_message_id: "wamid.olá".into(),
            from: "5511999990000".into(),
            profile_name: None,
            message_type: leadhub_core::MessageType::Text,
            text: "Olá".into(),
            timestamp: None,
        };
        storage
            .append_inbound(&resolution.conversation.id, &inbound)
            .await
            .unwrap();

        let conversation = storage
            .get_conversation(&resolution.conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.status, ConversationStatus::Open);
        assert_eq!(conversation.channel, Channel::Whatsapp);
        assert_eq!(conversation.unread_count, 1);

        let lead = storage.get_lead(&resolution.lead.id).await.unwrap().unwrap();
        assert_eq!(lead.source, "whatsapp");

        let messages = storage
            .list_messages(&conversation.id, None)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Olá");
        assert_eq!(messages[0].direction, leadhub_core::Direction::In);
        assert_eq!(messages[0].message_type, leadhub_core::MessageType::Text);

        storage.shutdown().await.unwrap();
    }
}
