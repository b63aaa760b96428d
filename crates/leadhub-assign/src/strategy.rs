// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Least-loaded selection.
//!
//! Pure function over a candidate list and a load snapshot: no storage
//! access, so the same inputs always give the same pick.

use std::collections::HashMap;

use leadhub_core::{Agent, AgentLoad, DistributionSettings};
use serde::Serialize;

/// The chosen agent and the load it had when chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pick {
    pub agent_id: String,
    pub load: i64,
}

/// Whether `agent` can take another conversation.
///
/// Capacity is measured in open conversations regardless of the load metric.
pub fn has_capacity(agent: &Agent, load: &AgentLoad) -> bool {
    match agent.max_concurrent_chats {
        Some(max) => load.open_conversations < i64::from(max),
        None => true,
    }
}

/// Pick the least-loaded eligible candidate, ties broken by smallest id.
///
/// Returns `None` when distribution is not automatic or nobody is eligible.
/// Agents missing from `loads` count as carrying no load.
pub fn pick_assignee(
    settings: &DistributionSettings,
    candidates: &[Agent],
    loads: &HashMap<String, AgentLoad>,
) -> Option<Pick> {
    if !settings.is_automatic() {
        return None;
    }
    candidates
        .iter()
        .filter(|agent| agent.active)
        .map(|agent| (agent, loads.get(&agent.id).copied().unwrap_or_default()))
        .filter(|(agent, load)| has_capacity(agent, load))
        .map(|(agent, load)| (load.by(settings.load_metric), &agent.id))
        .min()
        .map(|(load, id)| Pick {
            agent_id: id.clone(),
            load,
        })
}
