// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent directory and derived load.

use std::collections::HashMap;

use chrono::{Local, TimeZone, Utc};
use leadhub_core::{Agent, AgentLoad, LeadhubError, format_timestamp, now_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{AGENT_COLUMNS, agent_from_row};

fn ids_json(ids: &[String]) -> Result<String, LeadhubError> {
    serde_json::to_string(ids).map_err(|e| LeadhubError::Storage {
        source: Box::new(e),
    })
}

/// Start of the current local day, as a stored timestamp.
pub(crate) fn local_midnight() -> String {
    let today = Local::now().date_naive();
    today
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|local| format_timestamp(local.with_timezone(&Utc)))
        .unwrap_or_else(|| format_timestamp(today.and_time(Default::default()).and_utc()))
}

pub async fn upsert_agent(db: &Database, agent: &Agent) -> Result<(), LeadhubError> {
    let agent = agent.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO agents (id, name, role, active, online, pipeline, max_concurrent_chats,
                                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     role = excluded.role,
                     active = excluded.active,
                     online = excluded.online,
                     pipeline = excluded.pipeline,
                     max_concurrent_chats = excluded.max_concurrent_chats,
                     updated_at = excluded.updated_at",
                params![
                    agent.id,
                    agent.name,
                    agent.role,
                    agent.active,
                    agent.online,
                    agent.pipeline.map(|p| p.to_string()),
                    agent.max_concurrent_chats,
                    now_timestamp(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_agent(db: &Database, id: &str) -> Result<Option<Agent>, LeadhubError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                params![id],
                agent_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active agents holding `role`, ordered by id.
pub async fn list_active_agents_by_role(
    db: &Database,
    role: &str,
) -> Result<Vec<Agent>, LeadhubError> {
    let role = role.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AGENT_COLUMNS} FROM agents WHERE role = ?1 AND active = 1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![role], agent_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Active agents among `ids`, ordered by id. Unknown ids are skipped.
pub async fn list_active_agents_by_ids(
    db: &Database,
    ids: &[String],
) -> Result<Vec<Agent>, LeadhubError> {
    let ids = ids_json(ids)?;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AGENT_COLUMNS} FROM agents
                 WHERE active = 1 AND id IN (SELECT value FROM json_each(?1))
                 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![ids], agent_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_agent_online(db: &Database, id: &str, online: bool) -> Result<(), LeadhubError> {
    let id_owned = id.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE agents SET online = ?2, updated_at = ?3 WHERE id = ?1",
                params![id_owned, online, now_timestamp()],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(LeadhubError::not_found("agent", id));
    }
    Ok(())
}

/// Open-conversation and assigned-today counts for every id, in one statement.
///
/// Ids with no rows report zero load.
pub async fn agent_loads(
    db: &Database,
    ids: &[String],
) -> Result<HashMap<String, AgentLoad>, LeadhubError> {
    let ids_param = ids_json(ids)?;
    let since = local_midnight();
    let mut loads: HashMap<String, AgentLoad> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ids.value,
                        (SELECT COUNT(*) FROM conversations c
                          WHERE c.assigned_to = ids.value AND c.status <> 'closed'),
                        (SELECT COUNT(*) FROM leads l
                          WHERE l.assigned_to = ids.value AND l.assigned_at >= ?2)
                 FROM json_each(?1) AS ids",
            )?;
            let rows = stmt.query_map(params![ids_param, since], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    AgentLoad {
                        open_conversations: row.get(1)?,
                        assigned_today: row.get(2)?,
                    },
                ))
            })?;
            rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        })
        .await
        .map_err(map_tr_err)?;

    for id in ids {
        loads.entry(id.clone()).or_default();
    }
    Ok(loads)
}
