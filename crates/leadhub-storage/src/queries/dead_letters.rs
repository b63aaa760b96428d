// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dead-letter rows for events that exhausted their retries.

use leadhub_core::{DeadLetter, LeadhubError, now_timestamp};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::dead_letter_from_row;

pub async fn record_dead_letter(db: &Database, letter: &DeadLetter) -> Result<(), LeadhubError> {
    let letter = letter.clone();
    let payload = serde_json::to_string(&letter.payload).map_err(|e| LeadhubError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO dead_letters (id, stage, payload, error, attempts, resolved, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    letter.id,
                    letter.stage.to_string(),
                    payload,
                    letter.error,
                    letter.attempts,
                    letter.resolved,
                    letter.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Dead letters, oldest first.
pub async fn list_dead_letters(
    db: &Database,
    include_resolved: bool,
) -> Result<Vec<DeadLetter>, LeadhubError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, stage, payload, error, attempts, resolved, created_at
                 FROM dead_letters WHERE (?1 = 1 OR resolved = 0)
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![include_resolved], dead_letter_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn resolve_dead_letter(db: &Database, id: &str) -> Result<(), LeadhubError> {
    let id_owned = id.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE dead_letters SET resolved = 1, resolved_at = ?2 WHERE id = ?1",
                params![id_owned, now_timestamp()],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(LeadhubError::not_found("dead letter", id));
    }
    Ok(())
}
