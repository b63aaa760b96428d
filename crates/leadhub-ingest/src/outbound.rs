// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent replies: provider send, persist, publish.

use std::sync::Arc;

use leadhub_core::{
    AppendOutcome, ConversationRepository, ConversationStatus, DeadLetter, DeadLetterQueue,
    DeadLetterStage, EventPublisher, LeadhubError, Message, MessageStatus, MessageStore,
    MessageType, MessagingProvider, OutboundDraft, ProviderError, Sender, StorageAdapter, Topic,
};
use leadhub_resilience::{RetryPolicy, retry, retry_transient};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

/// A text reply requested by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub conversation_id: String,
    pub text: String,
    pub user_id: String,
}

/// Sends agent replies through the messaging provider.
///
/// A provider failure does not fail the call: the message is stored with
/// status `failed` and the provider error, so the agent sees what happened.
pub struct OutboundDispatcher {
    storage: Arc<dyn StorageAdapter>,
    provider: Arc<dyn MessagingProvider>,
    publisher: Arc<dyn EventPublisher>,
    retry: RetryPolicy,
}

impl OutboundDispatcher {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        provider: Arc<dyn MessagingProvider>,
        publisher: Arc<dyn EventPublisher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            storage,
            provider,
            publisher,
            retry,
        }
    }

    pub async fn send_text(&self, request: SendRequest) -> Result<Message, LeadhubError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(LeadhubError::Parse {
                message: "message text is empty".into(),
            });
        }

        let conversation = self
            .storage
            .get_conversation(&request.conversation_id)
            .await?
            .ok_or_else(|| LeadhubError::not_found("conversation", &request.conversation_id))?;
        if conversation.status == ConversationStatus::Closed {
            return Err(LeadhubError::conflict(format!(
                "conversation {} is closed",
                conversation.id
            )));
        }

        let sent = retry(&self.retry, "send_text", ProviderError::is_retryable, |_| {
            self.provider.send_text(&conversation.phone, text)
        })
        .await;

        let (provider_message_id, status, send_error) = match sent {
            Ok(sent) => (Some(sent.provider_message_id), MessageStatus::Sent, None),
            Err(failure) => {
                let detail = failure.error.to_string();
                warn!(
                    conversation_id = %conversation.id,
                    attempts = failure.attempts,
                    error = %detail,
                    "provider send failed, storing message as failed"
                );
                if failure.exhausted {
                    let letter = DeadLetter::new(
                        DeadLetterStage::Send,
                        json!({
                            "conversationId": conversation.id,
                            "to": conversation.phone,
                            "text": text,
                            "userId": request.user_id,
                        }),
                        &detail,
                        failure.attempts,
                    );
                    if let Err(e) = self.storage.record_dead_letter(&letter).await {
                        error!(error = %e, "failed to record dead letter for send");
                    }
                }
                (None, MessageStatus::Failed, Some(detail))
            }
        };

        let draft = OutboundDraft {
            conversation_id: conversation.id.clone(),
            text: text.to_string(),
            message_type: MessageType::Text,
            sender: Sender::Agent(request.user_id.clone()),
            provider_message_id,
            status,
            error: send_error,
        };
        let appended = retry_transient(&self.retry, "append_outbound", |_| {
            self.storage.append_outbound(draft.clone())
        })
        .await
        .map_err(|failure| failure.into_inner())?;

        let (message, conversation) = match appended {
            AppendOutcome::Inserted {
                message,
                conversation,
            } => (message, conversation),
            AppendOutcome::Duplicate { message } => return Ok(message),
        };

        info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            status = %message.status,
            agent_id = %request.user_id,
            "outbound message stored"
        );

        let seq = Some(conversation.version);
        let publications = [
            (
                Topic::ConversationMessage(conversation.id.clone()),
                json!({ "message": message, "conversation": conversation }),
            ),
            (
                Topic::ConversationUpdated,
                json!({ "conversation": conversation }),
            ),
        ];
        for (topic, payload) in publications {
            if let Err(e) = self.publisher.publish(&topic, payload, seq).await {
                warn!(%topic, error = %e, "failed to publish outbound message");
            }
        }

        Ok(message)
    }
}
