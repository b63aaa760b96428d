// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime fanout for Leadhub.
//!
//! [`EventBus`] keeps one broadcast channel per [`Topic`](leadhub_core::Topic)
//! and implements [`EventPublisher`](leadhub_core::EventPublisher) for the
//! ingestion pipeline. [`SubscriptionRegistry`] is the client-side record of
//! topics to re-arm whenever a realtime connection is (re)established.

pub mod bus;
pub mod event;
pub mod registry;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use registry::{EventHandler, SubscriptionRegistry};
