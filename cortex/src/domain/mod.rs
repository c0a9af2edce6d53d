// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cortex Domain Layer
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`pattern`] | `Pattern`, `PatternId`, `ConfidenceTier`, `PatternDraft` |
//! | [`events`] | `CortexEvent` |
//! | [`errors`] | `MemoryError` |

pub mod errors;
pub mod events;
pub mod pattern;

pub use errors::*;
pub use events::*;
pub use pattern::*;
