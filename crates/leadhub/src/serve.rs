// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadhub serve` command implementation.
//!
//! Opens SQLite storage, builds the WhatsApp client, realtime bus,
//! assignment engine and ingestion pipeline, then serves the gateway until
//! SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::{Duration, Instant};

use leadhub_assign::AssignmentEngine;
use leadhub_bus::EventBus;
use leadhub_config::model::LeadhubConfig;
use leadhub_core::{HealthStatus, LeadhubError, PluginAdapter, StorageAdapter};
use leadhub_gateway::{
    AuthConfig, GatewayState, HealthState, ServerConfig, WebhookSecrets, start_server,
};
use leadhub_ingest::{IngestionOrchestrator, OutboundDispatcher, shutdown};
use leadhub_resilience::RetryPolicy;
use leadhub_storage::SqliteStorage;
use leadhub_whatsapp::WhatsAppClient;
use tracing::{info, warn};

/// How long in-flight requests get after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `leadhub serve` command.
pub async fn run_serve(config: LeadhubConfig) -> Result<(), LeadhubError> {
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "starting leadhub serve");

    let storage = open_storage(&config).await?;
    let provider = Arc::new(WhatsAppClient::new(&config.whatsapp)?);
    let bus = Arc::new(EventBus::new(config.realtime.channel_capacity));

    let engine = Arc::new(AssignmentEngine::new(
        storage.clone(),
        bus.clone(),
        config.assignment.clone(),
    ));
    let orchestrator = Arc::new(IngestionOrchestrator::new(
        storage.clone(),
        bus.clone(),
        engine.clone(),
        &config.ingestion,
    ));
    let dispatcher = Arc::new(OutboundDispatcher::new(
        storage.clone(),
        provider.clone(),
        bus.clone(),
        RetryPolicy::from(&config.ingestion),
    ));

    log_health(storage.as_ref()).await;
    log_health(provider.as_ref()).await;
    log_health(bus.as_ref()).await;

    if config.gateway.bearer_token.is_none() {
        warn!("gateway.bearer_token is not set, REST and WebSocket routes will reject every request");
    }
    if config.whatsapp.app_secret.is_none() {
        warn!("whatsapp.app_secret is not set, webhook signatures are not verified");
    }

    let state = GatewayState {
        storage: storage.clone(),
        bus: bus.clone(),
        orchestrator,
        dispatcher,
        engine,
        webhook: WebhookSecrets {
            verify_token: config.whatsapp.verify_token.clone(),
            app_secret: config.whatsapp.app_secret.clone(),
        },
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        health: HealthState {
            start_time: Instant::now(),
        },
    };

    let cancel = shutdown::install_signal_handler();
    let server_config = ServerConfig::from(&config.gateway);
    let mut server = tokio::spawn({
        let cancel = cancel.clone();
        async move { start_server(&server_config, state, cancel).await }
    });

    // The server only returns on its own if it failed to bind or crashed.
    let served = tokio::select! {
        joined = &mut server => Some(joined),
        _ = cancel.cancelled() => None,
    };
    let served = match served {
        Some(joined) => Some(joined),
        None => {
            let mut joined = None;
            let drained = shutdown::drain_with_timeout(
                async {
                    joined = Some((&mut server).await);
                },
                DRAIN_TIMEOUT,
            )
            .await;
            if !drained {
                server.abort();
            }
            joined
        }
    };

    bus.close();
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "provider shutdown failed");
    }
    storage.close().await?;

    match served {
        Some(Ok(result)) => result?,
        Some(Err(e)) => {
            return Err(LeadhubError::Internal(format!("gateway task failed: {e}")));
        }
        None => {}
    }

    info!("leadhub serve shutdown complete");
    Ok(())
}

/// Opens and migrates the SQLite database.
pub async fn open_storage(config: &LeadhubConfig) -> Result<Arc<SqliteStorage>, LeadhubError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");
    Ok(Arc::new(storage))
}

async fn log_health(adapter: &dyn PluginAdapter) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => {
            info!(adapter = adapter.name(), version = %adapter.version(), "adapter healthy");
        }
        Ok(status) => {
            warn!(adapter = adapter.name(), status = ?status, "adapter not healthy");
        }
        Err(e) => {
            warn!(adapter = adapter.name(), error = %e, "adapter health check failed");
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leadhub={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
