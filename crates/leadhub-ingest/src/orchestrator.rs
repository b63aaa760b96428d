// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion: normalize, resolve, store, assign, publish.

use std::sync::Arc;

use leadhub_assign::{AssignmentEngine, AssignmentOutcome};
use leadhub_config::model::IngestionConfig;
use leadhub_core::{
    AppendOutcome, Channel, ConversationRepository, DeadLetter, DeadLetterQueue,
    DeadLetterStage, EventPublisher, InboundMessage, MessageStore, Pipeline,
    ProviderEvent, StatusUpdate, StorageAdapter, Topic,
};
use leadhub_resilience::{RetryPolicy, retry_transient};
use leadhub_whatsapp::decode_events;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::state::{EventKind, EventOutcome, EventState, IngestReport};

/// One event to publish after a store completes.
#[derive(Debug, Clone)]
pub(crate) struct Publication {
    pub topic: Topic,
    pub payload: Value,
    pub seq: Option<i64>,
}

impl Publication {
    fn new(topic: Topic, payload: Value, seq: Option<i64>) -> Self {
        Self {
            topic,
            payload,
            seq,
        }
    }
}

/// Drives provider events through the ingestion pipeline.
///
/// Each event is handled on its own: a failure is contained to that event and
/// reported in the [`IngestReport`], never propagated to siblings.
pub struct IngestionOrchestrator {
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
    engine: Arc<AssignmentEngine>,
    retry: RetryPolicy,
    channel: Channel,
    default_pipeline: Pipeline,
}

impl IngestionOrchestrator {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        publisher: Arc<dyn EventPublisher>,
        engine: Arc<AssignmentEngine>,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            storage,
            publisher,
            engine,
            retry: RetryPolicy::from(config),
            channel: Channel::Whatsapp,
            default_pipeline: config.default_pipeline,
        }
    }

    /// Replace the retry policy (tests use a no-delay policy).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ingest every event in a raw webhook body.
    pub async fn ingest_payload(&self, payload: &Value) -> IngestReport {
        let Some(events) = decode_events(payload) else {
            warn!("webhook body matches no known payload shape, dropped");
            return IngestReport::unrecognized();
        };

        let mut report = IngestReport {
            recognized: true,
            events: Vec::with_capacity(events.len()),
        };
        for event in events {
            report.events.push(self.ingest_event(event).await);
        }

        info!(
            events = report.events.len(),
            published = report.count(EventState::Published),
            duplicate = report.count(EventState::Duplicate),
            ignored = report.count(EventState::Ignored),
            rejected = report.count(EventState::Rejected),
            dead_lettered = report.count(EventState::DeadLettered),
            "webhook ingested"
        );
        report
    }

    pub async fn ingest_event(&self, event: ProviderEvent) -> EventOutcome {
        match event {
            ProviderEvent::Message(message) => self.ingest_message(message).await,
            ProviderEvent::Status(update) => self.ingest_status(update).await,
        }
    }

    /// Inbound message path.
    ///
    /// Events for the conversation go out in the order the writes happened:
    /// creation and append first, then whatever the assignment engine
    /// announces, or the queue entry when nobody took the conversation.
    pub async fn ingest_message(&self, message: InboundMessage) -> EventOutcome {
        let mut outcome = EventOutcome::start(EventKind::Message, &message.provider_message_id);

        let resolution = match self
            .storage
            .resolve_inbound_message(&message, self.channel, self.default_pipeline)
            .await
        {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                debug!(provider_message_id = %message.provider_message_id, "duplicate delivery, already stored");
                return outcome.finish(EventState::Duplicate, None);
            }
            Err(e) => {
                error!(provider_message_id = %message.provider_message_id, error = %e, "conversation resolution failed, event rejected");
                return outcome.finish(EventState::Rejected, Some(e.to_string()));
            }
        };
        outcome.advance(EventState::Resolved);
        outcome.conversation_id = Some(resolution.conversation.id.clone());
        let conversation_id = resolution.conversation.id.clone();

        let stored = retry_transient(&self.retry, "append_inbound", |_| {
            self.storage.append_inbound(&conversation_id, &message)
        })
        .await;
        let (stored_message, conversation) = match stored {
            Ok(AppendOutcome::Inserted {
                message,
                conversation,
            }) => (message, conversation),
            Ok(AppendOutcome::Duplicate { .. }) => {
                debug!(provider_message_id = %message.provider_message_id, "duplicate delivery");
                outcome.advance(EventState::Stored);
                return outcome.finish(EventState::Duplicate, None);
            }
            Err(failure) if failure.exhausted => {
                let detail = failure.error.to_string();
                self.dead_letter(
                    DeadLetterStage::Store,
                    json!({ "conversationId": conversation_id, "message": message }),
                    &detail,
                    failure.attempts,
                )
                .await;
                return outcome.finish(EventState::DeadLettered, Some(detail));
            }
            Err(failure) => {
                warn!(provider_message_id = %message.provider_message_id, error = %failure.error, "inbound append rejected");
                return outcome.finish(EventState::Rejected, Some(failure.error.to_string()));
            }
        };
        outcome.advance(EventState::Stored);

        let seq = Some(conversation.version);
        let mut publications = Vec::new();
        if resolution.lead_created {
            publications.push(Publication::new(
                Topic::LeadNew,
                json!({ "lead": resolution.lead }),
                None,
            ));
        }
        if resolution.conversation_created {
            publications.push(Publication::new(
                Topic::ConversationNew,
                json!({ "conversation": conversation }),
                seq,
            ));
        }
        publications.push(Publication::new(
            Topic::ConversationMessage(conversation.id.clone()),
            json!({ "message": stored_message, "conversation": conversation }),
            seq,
        ));
        publications.push(Publication::new(
            Topic::ConversationUpdated,
            json!({ "conversation": conversation }),
            seq,
        ));
        let mut failed = self.publish_each(publications).await;

        if conversation.assigned_to.is_some() {
            outcome.assigned_to = conversation.assigned_to.clone();
            return settle(outcome, failed);
        }

        match self.engine.assign_conversation(&conversation.id).await {
            Ok(AssignmentOutcome::Assigned { agent_id, .. }) => {
                outcome.advance(EventState::Assigned);
                outcome.assigned_to = Some(agent_id);
            }
            Ok(other) => outcome.assigned_to = other.owner().map(str::to_string),
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "assignment failed, conversation left queued");
            }
        }
        if outcome.assigned_to.is_none() {
            let queued = Publication::new(
                Topic::QueueUpdate,
                json!({ "conversationId": conversation.id, "assignedTo": null }),
                seq,
            );
            failed.extend(self.publish_each(vec![queued]).await);
        }
        settle(outcome, failed)
    }

    /// Delivery status path.
    pub async fn ingest_status(&self, update: StatusUpdate) -> EventOutcome {
        let mut outcome = EventOutcome::start(EventKind::Status, &update.provider_message_id);

        let applied =
            retry_transient(&self.retry, "apply_status", |_| self.storage.apply_status(&update))
                .await;
        let application = match applied {
            Ok(Some(application)) => application,
            Ok(None) => {
                debug!(provider_message_id = %update.provider_message_id, "status for unknown message ignored");
                return outcome.finish(EventState::Ignored, Some("unknown message".into()));
            }
            Err(failure) if failure.exhausted => {
                let detail = failure.error.to_string();
                self.dead_letter(
                    DeadLetterStage::Store,
                    json!({ "status": update }),
                    &detail,
                    failure.attempts,
                )
                .await;
                return outcome.finish(EventState::DeadLettered, Some(detail));
            }
            Err(failure) => {
                warn!(provider_message_id = %update.provider_message_id, error = %failure.error, "status update rejected");
                return outcome.finish(EventState::Rejected, Some(failure.error.to_string()));
            }
        };
        outcome.conversation_id = Some(application.message.conversation_id.clone());
        if !application.changed {
            return outcome.finish(EventState::Ignored, Some("status unchanged".into()));
        }
        outcome.advance(EventState::Stored);

        let publication = Publication::new(
            Topic::ConversationMessage(application.message.conversation_id.clone()),
            json!({ "type": "status", "message": application.message }),
            Some(application.conversation_version),
        );
        let failed = self.publish_each(vec![publication]).await;
        settle(outcome, failed)
    }

    /// Publish in order and return a description of each publication that
    /// could not be delivered. Those are dead-lettered; the rest still go out.
    async fn publish_each(&self, publications: Vec<Publication>) -> Vec<String> {
        let mut failed = Vec::new();
        for publication in publications {
            let result = retry_transient(&self.retry, "publish", |_| {
                self.publisher
                    .publish(&publication.topic, publication.payload.clone(), publication.seq)
            })
            .await;
            if let Err(failure) = result {
                let detail = failure.error.to_string();
                self.dead_letter(
                    DeadLetterStage::Publish,
                    json!({
                        "topic": publication.topic.to_string(),
                        "payload": publication.payload,
                        "seq": publication.seq,
                    }),
                    &detail,
                    failure.attempts,
                )
                .await;
                failed.push(format!("{}: {detail}", publication.topic));
            }
        }
        failed
    }

    async fn dead_letter(&self, stage: DeadLetterStage, payload: Value, error: &str, attempts: u32) {
        let letter = DeadLetter::new(stage, payload, error, attempts);
        match self.storage.record_dead_letter(&letter).await {
            Ok(()) => warn!(dead_letter_id = %letter.id, %stage, attempts, error, "event dead-lettered"),
            Err(e) => error!(%stage, attempts, error, record_error = %e, "failed to record dead letter"),
        }
    }
}

fn settle(mut outcome: EventOutcome, failed: Vec<String>) -> EventOutcome {
    if failed.is_empty() {
        outcome.advance(EventState::Published);
        outcome
    } else {
        outcome.finish(EventState::DeadLettered, Some(failed.join("; ")))
    }
}
