// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadhub assign-all` command implementation.
//!
//! One batch distribution pass over the queue and the eligible leads, for
//! cron jobs and manual catch-up after distribution was re-enabled. No
//! clients are connected, so realtime events go to an empty bus.

use std::sync::Arc;

use leadhub_assign::AssignmentEngine;
use leadhub_bus::EventBus;
use leadhub_config::model::LeadhubConfig;
use leadhub_core::{LeadhubError, StorageAdapter};
use tracing::info;

use crate::serve::{init_tracing, open_storage};

/// Runs the `leadhub assign-all` command and prints the batch report as JSON.
pub async fn run_assign_all(config: LeadhubConfig) -> Result<(), LeadhubError> {
    init_tracing(&config.service.log_level);

    let storage = open_storage(&config).await?;
    let bus = Arc::new(EventBus::new(config.realtime.channel_capacity));
    let engine = AssignmentEngine::new(storage.clone(), bus, config.assignment.clone());

    let report = engine.assign_all().await;
    storage.close().await?;
    let report = report?;

    info!(
        conversations = report.conversations.assigned,
        leads = report.leads.assigned,
        "batch assignment finished"
    );
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| LeadhubError::Internal(format!("failed to render report: {e}")))?;
    println!("{rendered}");
    Ok(())
}
