// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion and outbound dispatch.
//!
//! The [`IngestionOrchestrator`] takes a raw provider webhook body and drives
//! each event through normalization, conversation resolution, idempotent
//! storage, assignment, and realtime publication. Every event ends in a
//! terminal [`EventState`] recorded in the returned [`IngestReport`].
//!
//! The [`OutboundDispatcher`] sends agent replies through the messaging
//! provider and stores them with their delivery outcome.

pub mod orchestrator;
pub mod outbound;
pub mod shutdown;
pub mod state;

pub use orchestrator::IngestionOrchestrator;
pub use outbound::{OutboundDispatcher, SendRequest};
pub use shutdown::{drain_with_timeout, install_signal_handler};
pub use state::{EventKind, EventOutcome, EventState, IngestReport};
