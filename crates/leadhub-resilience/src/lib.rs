// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for Leadhub.
//!
//! Storage writes, event publication, and provider sends are retried with a
//! bounded exponential backoff before the caller gives up and dead-letters
//! the work.

pub mod retry;

pub use retry::{RetryFailure, RetryPolicy, retry, retry_transient};
