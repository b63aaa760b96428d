// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of failing on the first one.

use crate::diagnostic::ConfigError;
use crate::model::LeadhubConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &LeadhubConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host", "must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(
            "gateway.host",
            format!("`{host}` is not a valid IP address or hostname"),
        ));
    }

    if config.gateway.port == 0 {
        errors.push(ConfigError::validation("gateway.port", "must be non-zero"));
    }

    let base_url = &config.whatsapp.api_base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(
            "whatsapp.api_base_url",
            format!("`{base_url}` must start with http:// or https://"),
        ));
    }

    if config.whatsapp.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "whatsapp.request_timeout_secs",
            "must be at least 1",
        ));
    }

    // Sending needs both halves of the credential pair.
    if config.whatsapp.phone_number_id.is_some() != config.whatsapp.access_token.is_some() {
        errors.push(ConfigError::validation(
            "whatsapp.access_token",
            "phone_number_id and access_token must be set together",
        ));
    }

    for (key, role) in [
        ("assignment.sales_role", &config.assignment.sales_role),
        (
            "assignment.high_ticket_role",
            &config.assignment.high_ticket_role,
        ),
        (
            "assignment.low_ticket_role",
            &config.assignment.low_ticket_role,
        ),
    ] {
        if role.trim().is_empty() {
            errors.push(ConfigError::validation(key, "must not be empty"));
        }
    }

    if config.assignment.eligible_lead_statuses.is_empty() {
        errors.push(ConfigError::validation(
            "assignment.eligible_lead_statuses",
            "must list at least one status",
        ));
    }

    if config.assignment.batch_limit < 1 {
        errors.push(ConfigError::validation(
            "assignment.batch_limit",
            format!("must be at least 1, got {}", config.assignment.batch_limit),
        ));
    }

    if config.ingestion.max_attempts < 1 {
        errors.push(ConfigError::validation(
            "ingestion.max_attempts",
            "must be at least 1",
        ));
    }

    if config.ingestion.base_delay_ms > config.ingestion.max_delay_ms {
        errors.push(ConfigError::validation(
            "ingestion.base_delay_ms",
            format!(
                "{} exceeds ingestion.max_delay_ms ({})",
                config.ingestion.base_delay_ms, config.ingestion.max_delay_ms
            ),
        ));
    }

    if config.realtime.channel_capacity == 0 {
        errors.push(ConfigError::validation(
            "realtime.channel_capacity",
            "must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error_for(errors: &[ConfigError], wanted: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { key, .. } if key == wanted))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&LeadhubConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = LeadhubConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "storage.database_path"));
    }

    #[test]
    fn collects_every_violation() {
        let mut config = LeadhubConfig::default();
        config.service.log_level = "loud".into();
        config.gateway.port = 0;
        config.ingestion.base_delay_ms = 10_000;
        config.realtime.channel_capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(has_error_for(&errors, "service.log_level"));
        assert!(has_error_for(&errors, "gateway.port"));
        assert!(has_error_for(&errors, "ingestion.base_delay_ms"));
        assert!(has_error_for(&errors, "realtime.channel_capacity"));
    }

    #[test]
    fn half_configured_credentials_fail() {
        let mut config = LeadhubConfig::default();
        config.whatsapp.phone_number_id = Some("1234".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "whatsapp.access_token"));

        config.whatsapp.access_token = Some("EAAG".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_bad_host_and_base_url() {
        let mut config = LeadhubConfig::default();
        config.gateway.host = "local host!".into();
        config.whatsapp.api_base_url = "graph.facebook.com".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "gateway.host"));
        assert!(has_error_for(&errors, "whatsapp.api_base_url"));
    }

    #[test]
    fn accepts_ipv6_and_hostnames() {
        let mut config = LeadhubConfig::default();
        config.gateway.host = "::1".into();
        assert!(validate_config(&config).is_ok());
        config.gateway.host = "leadhub.internal".into();
        assert!(validate_config(&config).is_ok());
    }
}
