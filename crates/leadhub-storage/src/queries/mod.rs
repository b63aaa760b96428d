// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs on the writer.

pub mod agents;
pub mod audit;
pub mod conversations;
pub mod dead_letters;
pub mod leads;
pub mod messages;
pub mod settings;
