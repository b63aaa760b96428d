// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for leads, conversations, messages, and agents.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. Conversation
//! resolution and message appends run as single transactions on the writer,
//! which together with a partial unique index keeps one open conversation per
//! lead and channel.

pub mod adapter;
pub mod database;
pub mod migrations;
mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
