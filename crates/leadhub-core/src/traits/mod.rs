// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod provider;
pub mod publisher;
pub mod storage;

pub use adapter::PluginAdapter;
pub use provider::MessagingProvider;
pub use publisher::EventPublisher;
pub use storage::{
    AgentDirectory, AuditLog, ConversationRepository, DeadLetterQueue, MessageStore,
    SettingsStore, StorageAdapter,
};
