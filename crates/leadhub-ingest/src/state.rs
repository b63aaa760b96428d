// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-event pipeline states and the report returned to the webhook boundary.

use serde::Serialize;

/// States in the per-event FSM.
///
/// Messages move `Received -> Normalized -> Resolved -> Stored -> (Assigned) -> Published`;
/// status updates skip resolution and assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Received,
    Normalized,
    Resolved,
    Stored,
    Assigned,
    Published,
    /// Provider message id already stored; nothing was written or published.
    Duplicate,
    /// Status for an unknown message, or one that changed nothing.
    Ignored,
    /// Failed permanently; logged and not retried.
    Rejected,
    /// Transient failures outlasted the retry budget; a dead letter was recorded.
    DeadLettered,
}

impl EventState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventState::Published
                | EventState::Duplicate
                | EventState::Ignored
                | EventState::Rejected
                | EventState::DeadLettered
        )
    }
}

impl std::fmt::Display for EventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventState::Received => write!(f, "received"),
            EventState::Normalized => write!(f, "normalized"),
            EventState::Resolved => write!(f, "resolved"),
            EventState::Stored => write!(f, "stored"),
            EventState::Assigned => write!(f, "assigned"),
            EventState::Published => write!(f, "published"),
            EventState::Duplicate => write!(f, "duplicate"),
            EventState::Ignored => write!(f, "ignored"),
            EventState::Rejected => write!(f, "rejected"),
            EventState::DeadLettered => write!(f, "dead_lettered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Status,
}

/// What happened to one provider event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    pub provider_message_id: String,
    pub kind: EventKind,
    /// Every state visited, in order. The last one is terminal.
    pub path: Vec<EventState>,
    pub conversation_id: Option<String>,
    pub assigned_to: Option<String>,
    pub detail: Option<String>,
}

impl EventOutcome {
    pub(crate) fn start(kind: EventKind, provider_message_id: &str) -> Self {
        Self {
            provider_message_id: provider_message_id.to_string(),
            kind,
            path: vec![EventState::Received, EventState::Normalized],
            conversation_id: None,
            assigned_to: None,
            detail: None,
        }
    }

    pub(crate) fn advance(&mut self, state: EventState) {
        self.path.push(state);
    }

    pub(crate) fn finish(mut self, state: EventState, detail: Option<String>) -> Self {
        self.path.push(state);
        self.detail = detail;
        self
    }

    /// Final state of the event.
    pub fn state(&self) -> EventState {
        self.path.last().copied().unwrap_or(EventState::Received)
    }
}

/// Result of ingesting one webhook body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// False when the body matched no known payload shape.
    pub recognized: bool,
    pub events: Vec<EventOutcome>,
}

impl IngestReport {
    pub fn unrecognized() -> Self {
        Self::default()
    }

    pub fn count(&self, state: EventState) -> usize {
        self.events.iter().filter(|e| e.state() == state).count()
    }
}
