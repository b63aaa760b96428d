// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Leadhub ingestion and distribution workspace.
//!
//! This crate provides the domain types, error taxonomy, realtime topic names,
//! and adapter traits shared by every other crate. Storage, the messaging
//! provider, and the realtime bus all implement traits defined here.

pub mod error;
pub mod topic;
pub mod traits;
pub mod types;

pub use error::{LeadhubError, ProviderError};
pub use topic::Topic;
pub use types::*;

pub use traits::{
    AgentDirectory, AuditLog, ConversationRepository, DeadLetterQueue, EventPublisher,
    MessageStore, MessagingProvider, PluginAdapter, SettingsStore, StorageAdapter,
};
