// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment decisions and their side effects.
//!
//! Each decision reads the distribution settings, discovers candidates, reads
//! their loads in one query, picks, and then claims the row conditionally so
//! concurrent deciders converge on whoever claimed first.

use std::sync::Arc;

use leadhub_config::model::AssignmentConfig;
use leadhub_core::{
    AgentDirectory, AuditLog, Claim, Conversation, ConversationRepository, DistributionMode,
    DistributionSettings, EventPublisher, Interaction, InteractionKind, Lead, LeadhubError,
    SettingsStore, StorageAdapter, Topic,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::candidates::CandidateSource;
use crate::strategy::{Pick, pick_assignee};

const METHOD: &str = "least_loaded";

/// Why a decision left its target unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    Disabled,
    Manual,
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Assigned { agent_id: String, load: i64 },
    /// Someone owned the target already; it keeps that owner.
    AlreadyAssigned { agent_id: Option<String> },
    Unassigned(UnassignedReason),
}

impl AssignmentOutcome {
    /// The owner after the decision, if any.
    pub fn owner(&self) -> Option<&str> {
        match self {
            AssignmentOutcome::Assigned { agent_id, .. } => Some(agent_id),
            AssignmentOutcome::AlreadyAssigned { agent_id } => agent_id.as_deref(),
            AssignmentOutcome::Unassigned(_) => None,
        }
    }
}

/// Per-kind counters of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchTally {
    pub assigned: usize,
    pub already_assigned: usize,
    pub unassigned: usize,
    pub failed: usize,
}

impl BatchTally {
    fn record(&mut self, outcome: &Result<AssignmentOutcome, LeadhubError>) {
        match outcome {
            Ok(AssignmentOutcome::Assigned { .. }) => self.assigned += 1,
            Ok(AssignmentOutcome::AlreadyAssigned { .. }) => self.already_assigned += 1,
            Ok(AssignmentOutcome::Unassigned(_)) => self.unassigned += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Set when distribution is not automatic and nothing was attempted.
    pub skipped: Option<UnassignedReason>,
    pub conversations: BatchTally,
    pub leads: BatchTally,
}

/// Distributes conversations and leads to agents.
pub struct AssignmentEngine {
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
    config: AssignmentConfig,
}

impl AssignmentEngine {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        publisher: Arc<dyn EventPublisher>,
        config: AssignmentConfig,
    ) -> Self {
        Self {
            storage,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    /// Current distribution settings, read through on every call.
    ///
    /// A storage failure degrades to the disabled default.
    pub async fn settings(&self) -> DistributionSettings {
        match self
            .storage
            .get_setting(DistributionSettings::SETTINGS_KEY)
            .await
        {
            Ok(raw) => DistributionSettings::from_setting(raw.as_deref()),
            Err(e) => {
                warn!(error = %e, "failed to read distribution settings, treating as disabled");
                DistributionSettings::default()
            }
        }
    }

    /// Try to give an unassigned conversation an owner.
    ///
    /// On success the lead follows the conversation owner and advances out of
    /// the initial stage.
    pub async fn assign_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<AssignmentOutcome, LeadhubError> {
        let conversation = self
            .storage
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| LeadhubError::not_found("conversation", conversation_id))?;
        if conversation.status.is_closed() {
            return Err(LeadhubError::conflict(format!(
                "conversation {conversation_id} is closed"
            )));
        }
        if let Some(owner) = conversation.assigned_to {
            return Ok(AssignmentOutcome::AlreadyAssigned {
                agent_id: Some(owner),
            });
        }

        let settings = self.settings().await;
        if let Some(reason) = gate(&settings) {
            debug!(conversation_id, ?reason, "conversation left for manual assignment");
            return Ok(AssignmentOutcome::Unassigned(reason));
        }

        let source = CandidateSource::for_settings(&settings, &self.config.sales_role);
        let Some(pick) = self.decide(&settings, &source).await? else {
            info!(conversation_id, source = source.label(), "no eligible candidates, conversation left queued");
            return Ok(AssignmentOutcome::Unassigned(UnassignedReason::NoCandidates));
        };

        let claimed = match self
            .storage
            .assign_conversation(conversation_id, &pick.agent_id)
            .await?
        {
            Claim::Assigned(conversation) => conversation,
            Claim::AlreadyAssigned(conversation) => {
                debug!(conversation_id, "conversation claimed concurrently");
                return Ok(AssignmentOutcome::AlreadyAssigned {
                    agent_id: conversation.assigned_to,
                });
            }
        };

        let lead = match self
            .storage
            .assign_lead(
                &claimed.lead_id,
                &pick.agent_id,
                claimed.pipeline.stage_after_assignment(),
            )
            .await
        {
            Ok(Claim::Assigned(lead)) => Some(lead),
            Ok(Claim::AlreadyAssigned(_)) => None,
            Err(e) => {
                warn!(lead_id = %claimed.lead_id, error = %e, "lead claim after conversation assignment failed");
                None
            }
        };

        self.record(Interaction::new(
            InteractionKind::Assignment,
            Some(claimed.lead_id.clone()),
            Some(claimed.id.clone()),
            format!("conversation assigned to {}", pick.agent_id),
            Some(metadata(&settings, &source, &pick)),
        ))
        .await;
        self.announce_conversation(&claimed, lead.as_ref(), &pick).await;

        info!(
            conversation_id,
            agent_id = %pick.agent_id,
            load = pick.load,
            "conversation assigned"
        );
        Ok(AssignmentOutcome::Assigned {
            agent_id: pick.agent_id,
            load: pick.load,
        })
    }

    /// Try to give an unassigned lead an owner from its pipeline's closer role.
    pub async fn assign_lead(&self, lead_id: &str) -> Result<AssignmentOutcome, LeadhubError> {
        let lead = self
            .storage
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| LeadhubError::not_found("lead", lead_id))?;
        if let Some(owner) = lead.assigned_to {
            return Ok(AssignmentOutcome::AlreadyAssigned {
                agent_id: Some(owner),
            });
        }

        let settings = self.settings().await;
        if let Some(reason) = gate(&settings) {
            debug!(lead_id, ?reason, "lead left for manual assignment");
            return Ok(AssignmentOutcome::Unassigned(reason));
        }

        let source = CandidateSource::for_settings(&settings, self.config.role_for(lead.pipeline));
        let Some(pick) = self.decide(&settings, &source).await? else {
            info!(lead_id, source = source.label(), "no eligible candidates, lead left unassigned");
            return Ok(AssignmentOutcome::Unassigned(UnassignedReason::NoCandidates));
        };

        let claimed = match self
            .storage
            .assign_lead(lead_id, &pick.agent_id, lead.pipeline.stage_after_assignment())
            .await?
        {
            Claim::Assigned(lead) => lead,
            Claim::AlreadyAssigned(lead) => {
                return Ok(AssignmentOutcome::AlreadyAssigned {
                    agent_id: lead.assigned_to,
                });
            }
        };

        self.record(Interaction::new(
            InteractionKind::Assignment,
            Some(claimed.id.clone()),
            None,
            format!("lead assigned to {}", pick.agent_id),
            Some(metadata(&settings, &source, &pick)),
        ))
        .await;
        self.emit(&Topic::LeadUpdated, json!({ "lead": claimed }), None)
            .await;
        self.emit(
            &Topic::Agent(pick.agent_id.clone()),
            json!({ "type": "lead:assigned", "lead": claimed }),
            None,
        )
        .await;

        info!(lead_id, agent_id = %pick.agent_id, load = pick.load, status = %claimed.status, "lead assigned");
        Ok(AssignmentOutcome::Assigned {
            agent_id: pick.agent_id,
            load: pick.load,
        })
    }

    /// Assign every unassigned conversation, then every eligible lead, oldest first.
    ///
    /// A failing item is logged and counted; the batch continues.
    pub async fn assign_all(&self) -> Result<BatchReport, LeadhubError> {
        let mut report = BatchReport::default();
        let settings = self.settings().await;
        if let Some(reason) = gate(&settings) {
            info!(?reason, "distribution is not automatic, batch assignment skipped");
            report.skipped = Some(reason);
            return Ok(report);
        }

        let conversations = self
            .storage
            .list_unassigned_conversations(self.config.batch_limit)
            .await?;
        for conversation in &conversations {
            let outcome = self.assign_conversation(&conversation.id).await;
            if let Err(e) = &outcome {
                warn!(conversation_id = %conversation.id, error = %e, "batch conversation assignment failed");
            }
            report.conversations.record(&outcome);
        }

        let leads = self
            .storage
            .list_leads_for_assignment(&self.config.eligible_lead_statuses, self.config.batch_limit)
            .await?;
        for lead in &leads {
            let outcome = self.assign_lead(&lead.id).await;
            if let Err(e) = &outcome {
                warn!(lead_id = %lead.id, error = %e, "batch lead assignment failed");
            }
            report.leads.record(&outcome);
        }

        info!(
            conversations_assigned = report.conversations.assigned,
            leads_assigned = report.leads.assigned,
            failed = report.conversations.failed + report.leads.failed,
            "batch assignment finished"
        );
        Ok(report)
    }

    async fn decide(
        &self,
        settings: &DistributionSettings,
        source: &CandidateSource,
    ) -> Result<Option<Pick>, LeadhubError> {
        let candidates = source.discover(self.storage.as_ref()).await?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let ids: Vec<String> = candidates.iter().map(|a| a.id.clone()).collect();
        let loads = self.storage.agent_loads(&ids).await?;
        Ok(pick_assignee(settings, &candidates, &loads))
    }

    async fn record(&self, interaction: Interaction) {
        if let Err(e) = self.storage.record_interaction(&interaction).await {
            warn!(error = %e, "failed to record assignment interaction");
        }
    }

    async fn announce_conversation(&self, conversation: &Conversation, lead: Option<&Lead>, pick: &Pick) {
        let seq = Some(conversation.version);
        self.emit(
            &Topic::ConversationAssigned,
            json!({ "conversation": conversation, "agentId": pick.agent_id }),
            seq,
        )
        .await;
        self.emit(
            &Topic::Agent(pick.agent_id.clone()),
            json!({ "type": "conversation:assigned", "conversation": conversation }),
            seq,
        )
        .await;
        self.emit(
            &Topic::QueueUpdate,
            json!({ "conversationId": conversation.id, "assignedTo": pick.agent_id }),
            seq,
        )
        .await;
        if let Some(lead) = lead {
            self.emit(&Topic::LeadUpdated, json!({ "lead": lead }), None)
                .await;
        }
    }

    async fn emit(&self, topic: &Topic, payload: Value, seq: Option<i64>) {
        if let Err(e) = self.publisher.publish(topic, payload, seq).await {
            warn!(%topic, error = %e, "failed to publish assignment event");
        }
    }
}

fn gate(settings: &DistributionSettings) -> Option<UnassignedReason> {
    if !settings.enabled {
        Some(UnassignedReason::Disabled)
    } else if settings.mode == DistributionMode::Manual {
        Some(UnassignedReason::Manual)
    } else {
        None
    }
}

fn metadata(settings: &DistributionSettings, source: &CandidateSource, pick: &Pick) -> Value {
    json!({
        "method": METHOD,
        "metric": settings.load_metric,
        "load": pick.load,
        "source": source.label(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadhub_bus::EventBus;
    use leadhub_config::model::StorageConfig;
    use leadhub_core::{Agent, Channel, ConversationStatus, Pipeline};
    use leadhub_storage::{Database, SqliteStorage};
    use std::time::Duration;
    use tracing_test::traced_test;

    const AUTO: &str = r#"{"enabled":true,"mode":"auto"}"#;

    async fn storage() -> Arc<SqliteStorage> {
        let db = Database::open_in_memory().await.unwrap();
        Arc::new(SqliteStorage::from_database(StorageConfig::default(), db))
    }

    fn engine(storage: &Arc<SqliteStorage>, bus: &Arc<EventBus>) -> AssignmentEngine {
        AssignmentEngine::new(storage.clone(), bus.clone(), AssignmentConfig::default())
    }

    fn agent(id: &str, role: &str) -> Agent {
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

    async fn open_conversation(storage: &SqliteStorage, phone: &str) -> Conversation {
        storage
            .resolve_inbound_conversation(phone, Channel::Whatsapp, None, Pipeline::HighTicket)
            .await
            .unwrap()
            .conversation
    }

    async fn give(storage: &SqliteStorage, agent_id: &str, count: usize, prefix: &str) {
        for i in 0..count {
            let c = open_conversation(storage, &format!("55119{prefix}{i:04}")).await;
            storage.assign_conversation(&c.id, agent_id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn least_loaded_closer_gets_new_lead() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage.put_setting(DistributionSettings::SETTINGS_KEY, AUTO).await.unwrap();
        storage.upsert_agent(&agent("A", "closer_ht")).await.unwrap();
        storage.upsert_agent(&agent("B", "closer_ht")).await.unwrap();
        give(&storage, "A", 3, "1").await;
        give(&storage, "B", 1, "2").await;

        let fresh = storage
            .resolve_inbound_conversation("5511999990000", Channel::Whatsapp, None, Pipeline::HighTicket)
            .await
            .unwrap();
        let outcome = engine(&storage, &bus).assign_lead(&fresh.lead.id).await.unwrap();
        assert_eq!(
            outcome,
            AssignmentOutcome::Assigned {
                agent_id: "B".into(),
                load: 1
            }
        );

        let lead = storage.get_lead(&fresh.lead.id).await.unwrap().unwrap();
        assert_eq!(lead.assigned_to.as_deref(), Some("B"));
        assert_eq!(lead.status, "qualificado");

        let audit = storage.list_interactions(&lead.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].metadata.as_ref().unwrap()["method"], "least_loaded");
        assert_eq!(audit[0].metadata.as_ref().unwrap()["load"], 1);
    }

    #[tokio::test]
    async fn conversation_assignment_activates_and_claims_lead() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage.put_setting(DistributionSettings::SETTINGS_KEY, AUTO).await.unwrap();
        storage.upsert_agent(&agent("s1", "sales")).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = bus
            .subscribe(Topic::ConversationAssigned, move |event| {
                let _ = tx.send(event);
            })
            .unwrap();

        let conversation = open_conversation(&storage, "5511988887777").await;
        let outcome = engine(&storage, &bus)
            .assign_conversation(&conversation.id)
            .await
            .unwrap();
        assert_eq!(outcome.owner(), Some("s1"));

        let stored = storage.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConversationStatus::Active);
        assert_eq!(stored.assigned_to.as_deref(), Some("s1"));
        let lead = storage.get_lead(&stored.lead_id).await.unwrap().unwrap();
        assert_eq!(lead.assigned_to.as_deref(), Some("s1"));

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.seq, Some(stored.version));
        assert_eq!(event.payload["agentId"], "s1");
    }

    #[tokio::test]
    async fn disabled_distribution_assigns_nobody() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage.upsert_agent(&agent("s1", "sales")).await.unwrap();
        let conversation = open_conversation(&storage, "5511977776666").await;
        let engine = engine(&storage, &bus);

        assert_eq!(
            engine.assign_conversation(&conversation.id).await.unwrap(),
            AssignmentOutcome::Unassigned(UnassignedReason::Disabled)
        );

        storage
            .put_setting(DistributionSettings::SETTINGS_KEY, r#"{"enabled":true,"mode":"manual"}"#)
            .await
            .unwrap();
        assert_eq!(
            engine.assign_conversation(&conversation.id).await.unwrap(),
            AssignmentOutcome::Unassigned(UnassignedReason::Manual)
        );

        let stored = storage.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert!(stored.assigned_to.is_none());
        assert_eq!(stored.status, ConversationStatus::Open);
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_pool_leaves_conversation_queued() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage.put_setting(DistributionSettings::SETTINGS_KEY, AUTO).await.unwrap();
        let conversation = open_conversation(&storage, "5511966665555").await;

        let outcome = engine(&storage, &bus)
            .assign_conversation(&conversation.id)
            .await
            .unwrap();
        assert_eq!(outcome, AssignmentOutcome::Unassigned(UnassignedReason::NoCandidates));
        assert!(logs_contain("no eligible candidates"));
    }

    #[tokio::test]
    async fn participants_restrict_the_pool() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage
            .put_setting(
                DistributionSettings::SETTINGS_KEY,
                r#"{"enabled":true,"mode":"auto","participants":["z9"]}"#,
            )
            .await
            .unwrap();
        storage.upsert_agent(&agent("a1", "sales")).await.unwrap();
        storage.upsert_agent(&agent("z9", "support")).await.unwrap();
        let conversation = open_conversation(&storage, "5511955554444").await;

        let outcome = engine(&storage, &bus)
            .assign_conversation(&conversation.id)
            .await
            .unwrap();
        assert_eq!(outcome.owner(), Some("z9"));
    }

    #[tokio::test]
    async fn already_assigned_converges() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage.put_setting(DistributionSettings::SETTINGS_KEY, AUTO).await.unwrap();
        storage.upsert_agent(&agent("s1", "sales")).await.unwrap();
        let conversation = open_conversation(&storage, "5511944443333").await;
        storage.assign_conversation(&conversation.id, "other").await.unwrap();

        let outcome = engine(&storage, &bus)
            .assign_conversation(&conversation.id)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AssignmentOutcome::AlreadyAssigned {
                agent_id: Some("other".into())
            }
        );
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        let err = engine(&storage, &bus).assign_conversation("nope").await.unwrap_err();
        assert!(matches!(err, LeadhubError::NotFound { .. }));
    }

    #[tokio::test]
    async fn batch_assigns_oldest_first_and_spreads_load() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        storage.put_setting(DistributionSettings::SETTINGS_KEY, AUTO).await.unwrap();
        storage.upsert_agent(&agent("s1", "sales")).await.unwrap();
        storage.upsert_agent(&agent("s2", "sales")).await.unwrap();
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(open_conversation(&storage, &format!("551193333000{i}")).await.id);
        }

        let report = engine(&storage, &bus).assign_all().await.unwrap();
        assert_eq!(report.skipped, None);
        assert_eq!(report.conversations.assigned, 4);
        assert_eq!(report.conversations.failed, 0);

        let mut owners = Vec::new();
        for id in &ids {
            let c = storage.get_conversation(id).await.unwrap().unwrap();
            owners.push(c.assigned_to.unwrap());
        }
        assert_eq!(owners, vec!["s1", "s2", "s1", "s2"]);
    }

    #[tokio::test]
    async fn batch_is_skipped_when_disabled() {
        let storage = storage().await;
        let bus = Arc::new(EventBus::new(16));
        open_conversation(&storage, "5511922221111").await;
        let report = engine(&storage, &bus).assign_all().await.unwrap();
        assert_eq!(report.skipped, Some(UnassignedReason::Disabled));
        assert_eq!(report.conversations, BatchTally::default());
    }
}
