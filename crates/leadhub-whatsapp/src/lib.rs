// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API provider adapter.
//!
//! - [`payload`] turns webhook bodies into canonical [`ProviderEvent`](leadhub_core::ProviderEvent)s.
//! - [`client`] sends outbound text and template messages.
//! - [`webhook`] checks the subscription handshake and request signatures.

pub mod client;
pub mod payload;
pub mod webhook;

pub use client::WhatsAppClient;
pub use payload::{decode_events, normalize_inbound, normalize_status};
pub use webhook::{SIGNATURE_HEADER, SignatureError, VerifyQuery, verify_signature, verify_subscription};
