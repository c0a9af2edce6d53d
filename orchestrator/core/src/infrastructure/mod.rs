// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! In-process event delivery.

pub mod event_bus;

pub use event_bus::*;
