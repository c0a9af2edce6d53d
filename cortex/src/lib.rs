// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `hive-cortex` - Pattern Memory
//!
//! Confidence-tiered patterns indexed by embedding in an HNSW graph, with a
//! periodic dream cycle that folds low-confidence near-duplicates into
//! trusted patterns.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Store, rank, reinforce and consolidate learned patterns
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Pattern`, `ConfidenceTier`, `CortexEvent`, `MemoryError` |
//! | [`application`] | Application | `MemoryService`, `StandardMemoryService`, `ConsolidationScheduler` |
//! | [`infrastructure`] | Infrastructure | `HnswIndex`, `EmbeddingProvider`, `HashingEmbedding` |

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
