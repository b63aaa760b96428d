// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation resolution, lifecycle, and conditional assignment.
//!
//! Every mutation bumps `version`, which realtime events carry as `seq`.

use leadhub_core::{
    Channel, Claim, CloseReason, Conversation, ConversationFilter, ConversationLookup,
    ConversationStatus, InboundMessage, Lead, LeadProfile, LeadhubError, Pipeline, Resolution,
    normalize_phone, now_timestamp,
};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::models::{CONVERSATION_COLUMNS, conversation_from_row, is_constraint_violation};
use crate::queries::leads::{find_or_insert_lead, is_richer_name, select_lead};
use crate::queries::messages::select_by_provider_id;

pub(crate) fn select_conversation(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        conversation_from_row,
    )
    .optional()
}

fn select_open_by_lead(
    conn: &Connection,
    lead_id: &str,
    channel: Channel,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE lead_id = ?1 AND channel = ?2 AND status <> 'closed'"
        ),
        params![lead_id, channel.to_string()],
        conversation_from_row,
    )
    .optional()
}

fn select_open_by_phone(
    conn: &Connection,
    phone: &str,
    channel: Channel,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE phone = ?1 AND channel = ?2 AND status <> 'closed'
             ORDER BY created_at DESC LIMIT 1"
        ),
        params![phone, channel.to_string()],
        conversation_from_row,
    )
    .optional()
}

/// Insert an `open` conversation for `lead`.
///
/// On a unique-index violation (another open conversation exists) the
/// existing row is returned with `false`.
fn insert_or_converge(
    conn: &Connection,
    lead: &Lead,
    channel: Channel,
    initial_assignee: Option<&str>,
) -> rusqlite::Result<(Conversation, bool)> {
    let now = now_timestamp();
    let id = uuid::Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO conversations
             (id, lead_id, lead_name, phone, channel, status, assigned_to, unread_count,
              pipeline, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, 0, ?7, 1, ?8, ?8)",
        params![
            id,
            lead.id,
            lead.name,
            lead.phone,
            channel.to_string(),
            initial_assignee,
            lead.pipeline.to_string(),
            now
        ],
    );

    match inserted {
        Ok(_) => {
            let created = select_conversation(conn, &id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            Ok((created, true))
        }
        Err(e) if is_constraint_violation(&e) => {
            debug!(lead_id = %lead.id, %channel, "open conversation already exists, converging");
            let existing = select_open_by_lead(conn, &lead.id, channel)?.ok_or(e)?;
            Ok((existing, false))
        }
        Err(e) => Err(e),
    }
}

pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, LeadhubError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_conversation(conn, &id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_open_conversation(
    db: &Database,
    lookup: ConversationLookup,
    channel: Channel,
) -> Result<Option<Conversation>, LeadhubError> {
    db.connection()
        .call(move |conn| match &lookup {
            ConversationLookup::LeadId(lead_id) => select_open_by_lead(conn, lead_id, channel),
            ConversationLookup::Phone(phone) => {
                select_open_by_phone(conn, &normalize_phone(phone), channel)
            }
        })
        .await
        .map_err(map_tr_err)
}

enum CreateRow {
    MissingLead,
    Exists(Conversation),
    Created(Conversation),
}

/// Create an `open` conversation for an existing lead.
pub async fn create_conversation(
    db: &Database,
    lead_id: &str,
    channel: Channel,
    initial_assignee: Option<String>,
) -> Result<Conversation, LeadhubError> {
    let lead_id_owned = lead_id.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(lead) = select_lead(&tx, &lead_id_owned)? else {
                return Ok(CreateRow::MissingLead);
            };
            let (conversation, created) =
                insert_or_converge(&tx, &lead, channel, initial_assignee.as_deref())?;
            tx.commit()?;
            Ok(if created {
                CreateRow::Created(conversation)
            } else {
                CreateRow::Exists(conversation)
            })
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        CreateRow::Created(conversation) => Ok(conversation),
        CreateRow::MissingLead => Err(LeadhubError::not_found("lead", lead_id)),
        CreateRow::Exists(existing) => Err(LeadhubError::conflict(format!(
            "lead {lead_id} already has open conversation {} on {channel}",
            existing.id
        ))),
    }
}

/// Resolve `phone` inside an open transaction. The caller commits.
fn resolve_in_tx(
    tx: &Connection,
    phone: &str,
    channel: Channel,
    profile_name: Option<&str>,
    default_pipeline: Pipeline,
) -> rusqlite::Result<Resolution> {
    if let Some(mut conversation) = select_open_by_phone(tx, phone, channel)? {
        if let Some(name) = profile_name
            .map(str::trim)
            .filter(|n| is_richer_name(n, phone) && *n != conversation.lead_name)
        {
            let now = now_timestamp();
            tx.execute(
                "UPDATE conversations SET lead_name = ?2, version = version + 1,
                     updated_at = ?3
                 WHERE id = ?1",
                params![conversation.id, name, now],
            )?;
            tx.execute(
                "UPDATE leads SET name = ?2, updated_at = ?3
                 WHERE id = ?1 AND name = phone",
                params![conversation.lead_id, name, now],
            )?;
            conversation = select_conversation(tx, &conversation.id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        }
        let lead = select_lead(tx, &conversation.lead_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        return Ok(Resolution {
            lead,
            conversation,
            lead_created: false,
            conversation_created: false,
        });
    }

    let profile = LeadProfile::inbound(phone, profile_name, default_pipeline, channel);
    let (lead, lead_created) = find_or_insert_lead(tx, &profile)?;
    let (conversation, conversation_created) = insert_or_converge(tx, &lead, channel, None)?;
    Ok(Resolution {
        lead,
        conversation,
        lead_created,
        conversation_created,
    })
}

fn sender_phone(phone: &str) -> Result<String, LeadhubError> {
    let phone = normalize_phone(phone);
    if phone.is_empty() {
        return Err(LeadhubError::Parse {
            message: "sender phone has no digits".to_string(),
        });
    }
    Ok(phone)
}

/// Resolve an inbound sender to its open conversation on `channel`.
///
/// Reuses the open conversation when one exists, refreshing the display name
/// when the profile name is richer. Otherwise upserts the lead and creates an
/// unassigned `open` conversation. Runs as one transaction on the writer, so
/// concurrent deliveries for a new phone converge on a single conversation.
pub async fn resolve_inbound_conversation(
    db: &Database,
    phone: &str,
    channel: Channel,
    profile_name: Option<&str>,
    default_pipeline: Pipeline,
) -> Result<Resolution, LeadhubError> {
    let phone = sender_phone(phone)?;
    let profile_name = profile_name.map(str::to_string);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let resolution =
                resolve_in_tx(&tx, &phone, channel, profile_name.as_deref(), default_pipeline)?;
            tx.commit()?;
            Ok(resolution)
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve the conversation for an inbound message.
///
/// Returns `None` without writing anything when the provider message id is
/// already stored, even if its conversation has closed since.
pub async fn resolve_inbound_message(
    db: &Database,
    inbound: &InboundMessage,
    channel: Channel,
    default_pipeline: Pipeline,
) -> Result<Option<Resolution>, LeadhubError> {
    let phone = sender_phone(&inbound.from)?;
    let provider_message_id = inbound.provider_message_id.clone();
    let profile_name = inbound.profile_name.clone();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if select_by_provider_id(&tx, &provider_message_id)?.is_some() {
                return Ok(None);
            }
            let resolution =
                resolve_in_tx(&tx, &phone, channel, profile_name.as_deref(), default_pipeline)?;
            tx.commit()?;
            Ok(Some(resolution))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_conversations(
    db: &Database,
    filter: ConversationFilter,
) -> Result<Vec<Conversation>, LeadhubError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE (?1 IS NULL OR assigned_to = ?1)
                   AND (?2 = 0 OR assigned_to IS NULL)
                   AND (?3 = 1 OR status <> 'closed')
                 ORDER BY COALESCE(last_message_at, created_at) DESC, rowid DESC
                 LIMIT ?4"
            ))?;
            let rows = stmt.query_map(
                params![
                    filter.assigned_to,
                    filter.unassigned_only,
                    filter.include_closed,
                    filter.limit.unwrap_or(-1)
                ],
                conversation_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Non-closed conversations without an owner, oldest first.
pub async fn list_unassigned_conversations(
    db: &Database,
    limit: i64,
) -> Result<Vec<Conversation>, LeadhubError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE assigned_to IS NULL AND status <> 'closed'
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], conversation_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

enum ConversationWrite {
    Missing,
    Closed,
    Rejected(String),
    Done(Claim<Conversation>),
}

impl ConversationWrite {
    fn into_result(self, id: &str) -> Result<Claim<Conversation>, LeadhubError> {
        match self {
            ConversationWrite::Missing => Err(LeadhubError::not_found("conversation", id)),
            ConversationWrite::Closed => Err(LeadhubError::conflict(format!(
                "conversation {id} is closed"
            ))),
            ConversationWrite::Rejected(message) => Err(LeadhubError::conflict(message)),
            ConversationWrite::Done(claim) => Ok(claim),
        }
    }
}

/// Claim an unassigned, non-closed conversation and move it `open` -> `active`.
pub async fn assign_conversation(
    db: &Database,
    conversation_id: &str,
    agent_id: &str,
) -> Result<Claim<Conversation>, LeadhubError> {
    let id = conversation_id.to_string();
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(current) = select_conversation(&tx, &id)? else {
                return Ok(ConversationWrite::Missing);
            };
            if current.status.is_closed() {
                return Ok(ConversationWrite::Closed);
            }
            if current.assigned_to.is_some() {
                return Ok(ConversationWrite::Done(Claim::AlreadyAssigned(current)));
            }
            tx.execute(
                "UPDATE conversations SET assigned_to = ?2,
                     status = CASE WHEN status = 'open' THEN 'active' ELSE status END,
                     version = version + 1, updated_at = ?3
                 WHERE id = ?1 AND assigned_to IS NULL",
                params![id, agent_id, now_timestamp()],
            )?;
            let updated =
                select_conversation(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(ConversationWrite::Done(Claim::Assigned(updated)))
        })
        .await
        .map_err(map_tr_err)?
        .into_result(conversation_id)
}

/// Apply a validated lifecycle transition. Closing requires a reason.
pub async fn update_conversation_status(
    db: &Database,
    conversation_id: &str,
    status: ConversationStatus,
    reason: Option<CloseReason>,
) -> Result<Conversation, LeadhubError> {
    if status.is_closed() && reason.is_none() {
        return Err(LeadhubError::conflict(
            "closing a conversation requires a close reason",
        ));
    }
    let id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(current) = select_conversation(&tx, &id)? else {
                return Ok(ConversationWrite::Missing);
            };
            if current.status.is_closed() {
                return Ok(ConversationWrite::Closed);
            }
            if !current.status.can_transition_to(status) {
                return Ok(ConversationWrite::Rejected(format!(
                    "conversation {id} cannot move from {} to {status}",
                    current.status
                )));
            }
            let now = now_timestamp();
            let closed_at = status.is_closed().then(|| now.clone());
            tx.execute(
                "UPDATE conversations SET status = ?2, close_reason = ?3, closed_at = ?4,
                     version = version + 1, updated_at = ?5
                 WHERE id = ?1",
                params![
                    id,
                    status.to_string(),
                    reason.filter(|_| status.is_closed()).map(|r| r.to_string()),
                    closed_at,
                    now
                ],
            )?;
            let updated =
                select_conversation(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(ConversationWrite::Done(Claim::Assigned(updated)))
        })
        .await
        .map_err(map_tr_err)?
        .into_result(conversation_id)
        .map(Claim::into_inner)
}

/// Reset the unread counter.
pub async fn mark_conversation_read(
    db: &Database,
    conversation_id: &str,
) -> Result<Conversation, LeadhubError> {
    let id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(current) = select_conversation(&tx, &id)? else {
                return Ok(ConversationWrite::Missing);
            };
            if current.unread_count == 0 {
                return Ok(ConversationWrite::Done(Claim::Assigned(current)));
            }
            tx.execute(
                "UPDATE conversations SET unread_count = 0, version = version + 1,
                     updated_at = ?2
                 WHERE id = ?1",
                params![id, now_timestamp()],
            )?;
            let updated =
                select_conversation(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(ConversationWrite::Done(Claim::Assigned(updated)))
        })
        .await
        .map_err(map_tr_err)?
        .into_result(conversation_id)
        .map(Claim::into_inner)
}
