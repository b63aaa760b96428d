// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value settings rows.

use leadhub_core::{LeadhubError, now_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn get_setting(db: &Database, key: &str) -> Result<Option<String>, LeadhubError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn put_setting(db: &Database, key: &str, value: &str) -> Result<(), LeadhubError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, now_timestamp()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
