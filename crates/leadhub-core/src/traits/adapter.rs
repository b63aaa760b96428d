// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all process-wide adapters implement.

use async_trait::async_trait;

use crate::error::LeadhubError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health, and lifecycle for a long-lived adapter.
///
/// Storage, the messaging provider, and the realtime bus are created once at
/// startup, shared behind `Arc`, and shut down explicitly on exit.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, LeadhubError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), LeadhubError>;
}
