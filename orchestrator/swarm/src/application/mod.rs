// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm application services: the [`Coordinator`] and its execution seam.

pub mod coordinator;
pub mod executor;

pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorStats, DomainStats};
pub use executor::{ExecutionError, TaskExecutor};
