// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interaction (audit trail) rows.

use leadhub_core::{Interaction, LeadhubError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::interaction_from_row;

pub async fn record_interaction(
    db: &Database,
    interaction: &Interaction,
) -> Result<(), LeadhubError> {
    let interaction = interaction.clone();
    let metadata = interaction
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| LeadhubError::Storage {
            source: Box::new(e),
        })?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO interactions
                     (id, lead_id, conversation_id, kind, description, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    interaction.id,
                    interaction.lead_id,
                    interaction.conversation_id,
                    interaction.kind.to_string(),
                    interaction.description,
                    metadata,
                    interaction.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Interactions for a lead, oldest first.
pub async fn list_interactions(
    db: &Database,
    lead_id: &str,
) -> Result<Vec<Interaction>, LeadhubError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, lead_id, conversation_id, kind, description, metadata, created_at
                 FROM interactions WHERE lead_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![lead_id], interaction_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}
