// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure types for events, domain routing and configuration. No I/O beyond
//! configuration file loading.

pub mod events;
pub mod node_config;
pub mod routing;

pub use events::*;
pub use routing::*;
