// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment of conversations and leads to agents.
//!
//! Candidates come from the configured participants or from role discovery,
//! and the least-loaded one wins (ties by agent id). Distribution that is
//! disabled or manual never assigns.

pub mod candidates;
pub mod engine;
pub mod strategy;

pub use candidates::CandidateSource;
pub use engine::{AssignmentEngine, AssignmentOutcome, BatchReport, BatchTally, UnassignedReason};
pub use strategy::{Pick, has_capacity, pick_assignee};
