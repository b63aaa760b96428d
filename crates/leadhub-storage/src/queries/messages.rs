// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append, delivery status, and listing.

use leadhub_core::{
    AppendOutcome, Direction, InboundMessage, LeadhubError, Message, MessageStatus, OutboundDraft,
    Sender, StatusApplication, StatusUpdate, now_timestamp,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{MESSAGE_COLUMNS, message_from_row};
use crate::queries::conversations::select_conversation;

pub(crate) fn select_by_provider_id(
    conn: &Connection,
    provider_message_id: &str,
) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE provider_message_id = ?1"),
        params![provider_message_id],
        message_from_row,
    )
    .optional()
}

fn insert_message(conn: &Connection, msg: &Message) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            msg.id,
            msg.conversation_id,
            msg.provider_message_id,
            msg.direction.to_string(),
            msg.message_type.to_string(),
            msg.content,
            msg.status.to_string(),
            msg.sender.to_column(),
            msg.error,
            msg.sent_at,
            msg.created_at,
        ],
    )?;
    Ok(())
}

/// Update the denormalized conversation fields for a freshly inserted message.
///
/// The last-message snapshot only moves forward in `sent_at`; unread only
/// counts inbound messages.
fn touch_conversation(conn: &Connection, msg: &Message) -> rusqlite::Result<()> {
    let unread_delta = i64::from(msg.direction == Direction::In);
    conn.execute(
        "UPDATE conversations SET
             last_message_text = CASE WHEN last_message_at IS NULL OR last_message_at <= ?3
                 THEN ?2 ELSE last_message_text END,
             last_message_direction = CASE WHEN last_message_at IS NULL OR last_message_at <= ?3
                 THEN ?4 ELSE last_message_direction END,
             last_message_at = CASE WHEN last_message_at IS NULL OR last_message_at <= ?3
                 THEN ?3 ELSE last_message_at END,
             unread_count = unread_count + ?5,
             version = version + 1,
             updated_at = ?6
         WHERE id = ?1",
        params![
            msg.conversation_id,
            msg.content,
            msg.sent_at,
            msg.direction.to_string(),
            unread_delta,
            msg.created_at,
        ],
    )?;
    Ok(())
}

enum AppendRow {
    MissingConversation,
    Closed,
    Outcome(AppendOutcome),
}

impl AppendRow {
    fn into_result(self, conversation_id: &str) -> Result<AppendOutcome, LeadhubError> {
        match self {
            AppendRow::MissingConversation => {
                Err(LeadhubError::not_found("conversation", conversation_id))
            }
            AppendRow::Closed => Err(LeadhubError::conflict(format!(
                "conversation {conversation_id} is closed"
            ))),
            AppendRow::Outcome(outcome) => Ok(outcome),
        }
    }
}

/// Write `msg` and update its conversation in one transaction.
///
/// A message whose provider id is already stored yields `Duplicate` and
/// changes nothing.
fn append_in_tx(conn: &mut Connection, msg: Message) -> rusqlite::Result<AppendRow> {
    let tx = conn.transaction()?;

    if let Some(provider_id) = msg.provider_message_id.as_deref() {
        if let Some(existing) = select_by_provider_id(&tx, provider_id)? {
            return Ok(AppendRow::Outcome(AppendOutcome::Duplicate { message: existing }));
        }
    }

    let Some(conversation) = select_conversation(&tx, &msg.conversation_id)? else {
        return Ok(AppendRow::MissingConversation);
    };
    if conversation.status.is_closed() {
        return Ok(AppendRow::Closed);
    }

    insert_message(&tx, &msg)?;
    touch_conversation(&tx, &msg)?;
    let conversation = select_conversation(&tx, &msg.conversation_id)?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    tx.commit()?;

    Ok(AppendRow::Outcome(AppendOutcome::Inserted {
        message: msg,
        conversation,
    }))
}

/// Idempotently append an inbound message keyed by its provider id.
pub async fn append_inbound(
    db: &Database,
    conversation_id: &str,
    inbound: &InboundMessage,
) -> Result<AppendOutcome, LeadhubError> {
    let now = now_timestamp();
    let msg = Message {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        provider_message_id: Some(inbound.provider_message_id.clone()),
        direction: Direction::In,
        message_type: inbound.message_type,
        content: inbound.text.clone(),
        status: MessageStatus::Received,
        sender: Sender::Lead,
        error: None,
        sent_at: inbound.sent_at().unwrap_or_else(|| now.clone()),
        created_at: now,
    };
    db.connection()
        .call(move |conn| append_in_tx(conn, msg))
        .await
        .map_err(map_tr_err)?
        .into_result(conversation_id)
}

/// Append an outbound message after a send attempt.
pub async fn append_outbound(
    db: &Database,
    draft: OutboundDraft,
) -> Result<AppendOutcome, LeadhubError> {
    let now = now_timestamp();
    let conversation_id = draft.conversation_id.clone();
    let msg = Message {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_id: draft.conversation_id,
        provider_message_id: draft.provider_message_id,
        direction: Direction::Out,
        message_type: draft.message_type,
        content: draft.text,
        status: draft.status,
        sender: draft.sender,
        error: draft.error,
        sent_at: now.clone(),
        created_at: now,
    };
    db.connection()
        .call(move |conn| append_in_tx(conn, msg))
        .await
        .map_err(map_tr_err)?
        .into_result(&conversation_id)
}

/// Apply a delivery status by provider id.
///
/// Unknown ids return `None`. Stale or repeated statuses return the unchanged
/// message with `changed == false`. An applied status bumps the conversation
/// version so its realtime event orders after the message event.
pub async fn apply_status(
    db: &Database,
    update: &StatusUpdate,
) -> Result<Option<StatusApplication>, LeadhubError> {
    let update = update.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut message) = select_by_provider_id(&tx, &update.provider_message_id)? else {
                return Ok(None);
            };

            let changed = message.status.accepts(update.status);
            if changed {
                let error = update
                    .error
                    .clone()
                    .filter(|_| update.status == MessageStatus::Failed);
                tx.execute(
                    "UPDATE messages SET status = ?2, error = COALESCE(?3, error) WHERE id = ?1",
                    params![message.id, update.status.to_string(), error],
                )?;
                message.status = update.status;
                if error.is_some() {
                    message.error = error;
                }
                tx.execute(
                    "UPDATE conversations SET version = version + 1, updated_at = ?2
                     WHERE id = ?1",
                    params![message.conversation_id, now_timestamp()],
                )?;
            }

            let conversation_version: i64 = tx.query_row(
                "SELECT version FROM conversations WHERE id = ?1",
                params![message.conversation_id],
                |row| row.get(0),
            )?;
            tx.commit()?;

            Ok(Some(StatusApplication {
                message,
                changed,
                conversation_version,
            }))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message_by_provider_id(
    db: &Database,
    provider_message_id: &str,
) -> Result<Option<Message>, LeadhubError> {
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| select_by_provider_id(conn, &provider_message_id))
        .await
        .map_err(map_tr_err)
}

/// Messages of a conversation by `sent_at`, then insertion order.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, LeadhubError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY sent_at ASC, rowid ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(
                params![conversation_id, limit.unwrap_or(-1)],
                message_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}
