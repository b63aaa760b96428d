// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! `Database` is the single writer: query modules take `&Database` and run their
//! statements inside `connection().call(..)`. Do not open additional
//! connections for writes.

use std::path::Path;

use leadhub_core::LeadhubError;
use tracing::debug;

use crate::migrations;

/// Map a tokio-rusqlite error into the storage error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LeadhubError {
    LeadhubError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite writer connection.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, LeadhubError> {
        Self::open_with(path, true).await
    }

    /// Open the database at `path`, choosing the journal mode.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, LeadhubError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| LeadhubError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| LeadhubError::Storage {
                source: Box::new(e),
            })?;

        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Private in-memory database with the full schema. Used by tests and tooling.
    pub async fn open_in_memory() -> Result<Self, LeadhubError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| LeadhubError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), LeadhubError> {
        let applied = self
            .conn
            .call(move |conn| -> Result<Result<usize, String>, rusqlite::Error> {
                if wal_mode {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                }
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(migrations::run_migrations(conn).map_err(|e| e.to_string()))
            })
            .await
            .map_err(map_tr_err)?
            .map_err(|e| LeadhubError::Storage {
                source: format!("migration failed: {e}").into(),
            })?;
        if applied > 0 {
            debug!(applied, "schema migrations applied");
        }
        Ok(())
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Truncate the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), LeadhubError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), LeadhubError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}
