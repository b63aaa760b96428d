// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./leadhub.toml` > `~/.config/leadhub/leadhub.toml` >
//! `/etc/leadhub/leadhub.toml` with environment variable overrides via `LEADHUB_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LeadhubConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/leadhub/leadhub.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "leadhub.toml";

/// Top-level sections; env var names are split after the first matching prefix.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "whatsapp",
    "gateway",
    "assignment",
    "ingestion",
    "realtime",
];

/// Path of the per-user config file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leadhub/leadhub.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/leadhub/leadhub.toml` (system-wide)
/// 3. `~/.config/leadhub/leadhub.toml` (user XDG config)
/// 4. `./leadhub.toml` (local directory)
/// 5. `LEADHUB_*` environment variables
pub fn load_config() -> Result<LeadhubConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LeadhubConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LeadhubConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LeadhubConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LeadhubConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LeadhubConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `LEADHUB_WHATSAPP_ACCESS_TOKEN` must map to
/// `whatsapp.access_token`, not `whatsapp.access.token`.
fn env_provider() -> Env {
    Env::prefixed("LEADHUB_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_after_section_only() {
        assert_eq!(
            map_env_key("whatsapp_access_token"),
            "whatsapp.access_token"
        );
        assert_eq!(
            map_env_key("storage_database_path"),
            "storage.database_path"
        );
        assert_eq!(
            map_env_key("assignment_eligible_lead_statuses"),
            "assignment.eligible_lead_statuses"
        );
        assert_eq!(map_env_key("gateway_port"), "gateway.port");
    }

    #[test]
    fn unknown_env_keys_pass_through() {
        assert_eq!(map_env_key("something_else"), "something_else");
        assert_eq!(map_env_key("storagex"), "storagex");
    }
}
