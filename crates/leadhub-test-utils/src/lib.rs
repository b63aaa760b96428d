// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Leadhub integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Messaging provider that captures sends and replays scripted failures
//! - [`RecordingPublisher`] - Event publisher that records publishes and can fail on demand
//! - [`TestHarness`] - Temp-database stack wired the way the server wires it

pub mod fixtures;
pub mod harness;
pub mod mock_provider;
pub mod recording_publisher;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockProvider, SentRequest};
pub use recording_publisher::{Published, RecordingPublisher};
