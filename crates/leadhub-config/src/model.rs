// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use leadhub_core::Pipeline;
use serde::{Deserialize, Serialize};

/// Top-level Leadhub configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadhubConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// WhatsApp Cloud API credentials and webhook secrets.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// HTTP/WebSocket listener.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent roles and batch limits for distribution.
    #[serde(default)]
    pub assignment: AssignmentConfig,

    /// Retry policy for the ingestion pipeline.
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Realtime fanout.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "leadhub".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "leadhub.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL, without version.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Sending phone number id. `None` disables outbound sends.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Token expected in the subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` verification. `None` skips the check.
    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            phone_number_id: None,
            access_token: None,
            verify_token: None,
            app_secret: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for `/v1` and `/ws`. `None` leaves them open (local use only).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Distribution configuration.
///
/// The on/off switch and mode live in the `leadDistribution` settings row so
/// they can change at runtime; this section only holds deployment-level knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentConfig {
    /// Role discovered for conversation distribution.
    #[serde(default = "default_sales_role")]
    pub sales_role: String,

    #[serde(default = "default_high_ticket_role")]
    pub high_ticket_role: String,

    #[serde(default = "default_low_ticket_role")]
    pub low_ticket_role: String,

    /// Lead statuses picked up by batch lead assignment.
    #[serde(default = "default_eligible_lead_statuses")]
    pub eligible_lead_statuses: Vec<String>,

    /// Maximum items per batch run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: i64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            sales_role: default_sales_role(),
            high_ticket_role: default_high_ticket_role(),
            low_ticket_role: default_low_ticket_role(),
            eligible_lead_statuses: default_eligible_lead_statuses(),
            batch_limit: default_batch_limit(),
        }
    }
}

impl AssignmentConfig {
    /// Role whose agents receive leads of `pipeline`.
    pub fn role_for(&self, pipeline: Pipeline) -> &str {
        match pipeline {
            Pipeline::HighTicket => &self.high_ticket_role,
            Pipeline::LowTicket => &self.low_ticket_role,
        }
    }
}

fn default_sales_role() -> String {
    "sales".to_string()
}

fn default_high_ticket_role() -> String {
    Pipeline::HighTicket.closer_role().to_string()
}

fn default_low_ticket_role() -> String {
    Pipeline::LowTicket.closer_role().to_string()
}

fn default_eligible_lead_statuses() -> Vec<String> {
    vec![Pipeline::INITIAL_STAGE.to_string()]
}

fn default_batch_limit() -> i64 {
    500
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionConfig {
    /// Attempts per retried stage, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Pipeline assigned to leads first seen on an inbound channel.
    #[serde(default)]
    pub default_pipeline: Pipeline,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            default_pipeline: Pipeline::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

/// Realtime fanout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Per-topic broadcast buffer. Slower subscribers lag and drop events.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}
