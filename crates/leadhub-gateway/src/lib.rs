// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway.
//!
//! Receives provider webhooks, serves a small REST snapshot API, and streams
//! realtime events to agents over WebSocket. All state lives behind the
//! `Arc`-injected handles in [`GatewayState`].

pub mod auth;
pub mod handlers;
pub mod server;
pub mod webhook;
pub mod ws;

pub use auth::AuthConfig;
pub use server::{
    GatewayState, HealthState, ServerConfig, WebhookSecrets, build_router, start_server,
};
