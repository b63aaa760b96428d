// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite columns and `leadhub-core` domain types.
//!
//! Each `*_COLUMNS` constant lists the columns in the order its matching
//! `*_from_row` function reads them.

use std::collections::BTreeSet;
use std::str::FromStr;

use leadhub_core::{
    Agent, Conversation, DeadLetter, Interaction, LastMessage, Lead, Message, Sender,
};
use rusqlite::Row;
use rusqlite::types::Type;

pub(crate) const LEAD_COLUMNS: &str = "id, name, phone, email, company, pipeline, status, source, \
     estimated_value, tags, assigned_to, assigned_at, created_at, updated_at";

pub(crate) const CONVERSATION_COLUMNS: &str = "id, lead_id, lead_name, phone, channel, status, \
     assigned_to, unread_count, last_message_text, last_message_direction, last_message_at, \
     pipeline, version, close_reason, closed_at, created_at, updated_at";

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, provider_message_id, direction, \
     message_type, content, status, sender, error, sent_at, created_at";

pub(crate) const AGENT_COLUMNS: &str =
    "id, name, role, active, online, pipeline, max_concurrent_chats, created_at, updated_at";

/// Parse a text column through `FromStr`, reporting failures as conversion errors.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let tags: BTreeSet<String> = json_col(row, 9)?;
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        company: row.get(4)?,
        pipeline: parse_col(row, 5)?,
        status: row.get(6)?,
        source: row.get(7)?,
        estimated_value: row.get(8)?,
        tags,
        assigned_to: row.get(10)?,
        assigned_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let last_text: Option<String> = row.get(8)?;
    let last_direction = parse_opt_col(row, 9)?;
    let last_at: Option<String> = row.get(10)?;
    let last_message = match (last_text, last_direction, last_at) {
        (Some(text), Some(direction), Some(at)) => Some(LastMessage {
            text,
            direction,
            at,
        }),
        _ => None,
    };

    Ok(Conversation {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        lead_name: row.get(2)?,
        phone: row.get(3)?,
        channel: parse_col(row, 4)?,
        status: parse_col(row, 5)?,
        assigned_to: row.get(6)?,
        unread_count: row.get(7)?,
        last_message,
        pipeline: parse_col(row, 11)?,
        version: row.get(12)?,
        close_reason: parse_opt_col(row, 13)?,
        closed_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let sender: String = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        provider_message_id: row.get(2)?,
        direction: parse_col(row, 3)?,
        message_type: parse_col(row, 4)?,
        content: row.get(5)?,
        status: parse_col(row, 6)?,
        sender: Sender::from_column(&sender),
        error: row.get(8)?,
        sent_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub(crate) fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let max_chats: Option<i64> = row.get(6)?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        active: row.get(3)?,
        online: row.get(4)?,
        pipeline: parse_opt_col(row, 5)?,
        max_concurrent_chats: max_chats.map(|n| n.clamp(0, i64::from(u32::MAX)) as u32),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    let metadata: Option<String> = row.get(5)?;
    let metadata = metadata
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(Interaction {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        conversation_id: row.get(2)?,
        kind: parse_col(row, 3)?,
        description: row.get(4)?,
        metadata,
        created_at: row.get(6)?,
    })
}

pub(crate) fn dead_letter_from_row(row: &Row<'_>) -> rusqlite::Result<DeadLetter> {
    let attempts: i64 = row.get(4)?;
    Ok(DeadLetter {
        id: row.get(0)?,
        stage: parse_col(row, 1)?,
        payload: json_col(row, 2)?,
        error: row.get(3)?,
        attempts: attempts.clamp(0, i64::from(u32::MAX)) as u32,
        resolved: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Whether a rusqlite error is a UNIQUE/constraint violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
