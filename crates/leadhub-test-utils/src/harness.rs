// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full ingestion stack with a temp SQLite
//! database, a real event bus behind a [`RecordingPublisher`], and a
//! [`MockProvider`] in place of the WhatsApp client.

use std::sync::Arc;
use std::time::Duration;

use leadhub_assign::AssignmentEngine;
use leadhub_bus::EventBus;
use leadhub_config::model::{LeadhubConfig, StorageConfig};
use leadhub_core::{
    Agent, AgentDirectory, DistributionSettings, LeadhubError, SettingsStore, StorageAdapter,
};
use leadhub_ingest::{IngestReport, IngestionOrchestrator, OutboundDispatcher};
use leadhub_resilience::RetryPolicy;
use leadhub_storage::SqliteStorage;

use crate::mock_provider::MockProvider;
use crate::recording_publisher::RecordingPublisher;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    distribution: Option<String>,
    agents: Vec<Agent>,
    config: LeadhubConfig,
    retry: RetryPolicy,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            distribution: None,
            agents: Vec::new(),
            config: LeadhubConfig::default(),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                jitter: false,
            },
        }
    }

    /// Store this raw `leadDistribution` settings row.
    pub fn with_distribution(mut self, raw: &str) -> Self {
        self.distribution = Some(raw.to_string());
        self
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_config(mut self, config: LeadhubConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry policy for ingestion and outbound dispatch. Defaults to three
    /// attempts with no delay.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, LeadhubError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| LeadhubError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        if let Some(raw) = &self.distribution {
            storage
                .put_setting(DistributionSettings::SETTINGS_KEY, raw)
                .await?;
        }
        for agent in &self.agents {
            storage.upsert_agent(agent).await?;
        }

        let bus = Arc::new(EventBus::new(config.realtime.channel_capacity));
        let publisher = Arc::new(RecordingPublisher::wrapping(bus.clone()));
        let provider = Arc::new(MockProvider::new());

        let engine = Arc::new(AssignmentEngine::new(
            storage.clone(),
            publisher.clone(),
            config.assignment.clone(),
        ));
        let orchestrator = Arc::new(
            IngestionOrchestrator::new(
                storage.clone(),
                publisher.clone(),
                engine.clone(),
                &config.ingestion,
            )
            .with_retry_policy(self.retry.clone()),
        );
        let dispatcher = Arc::new(OutboundDispatcher::new(
            storage.clone(),
            provider.clone(),
            publisher.clone(),
            self.retry,
        ));

        Ok(TestHarness {
            storage,
            bus,
            publisher,
            provider,
            engine,
            orchestrator,
            dispatcher,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The event bus the recording publisher forwards to.
    pub bus: Arc<EventBus>,
    pub publisher: Arc<RecordingPublisher>,
    pub provider: Arc<MockProvider>,
    pub engine: Arc<AssignmentEngine>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub dispatcher: Arc<OutboundDispatcher>,
    pub config: LeadhubConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Feed a raw webhook body through the orchestrator.
    pub async fn ingest(&self, payload: &serde_json::Value) -> IngestReport {
        self.orchestrator.ingest_payload(payload).await
    }

    /// Storage as the trait object the rest of the stack sees.
    pub fn storage_adapter(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }
}
