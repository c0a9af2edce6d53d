// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod consolidation;
pub mod memory_service;

pub use consolidation::ConsolidationScheduler;
pub use memory_service::{MemoryQuery, MemoryService, MemoryStats, SearchResult, StandardMemoryService, SHARE_EVENT};
