// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Pure domain types for multi-agent coordination. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`agent`] | `Agent`, `AgentId`, `AgentStatus`, `AgentMetrics` |
//! | [`task`] | `Task`, `TaskId`, `TaskPriority`, `TaskStatus`, `TaskResult` |
//! | [`pool`] | `DomainPool`, `QueuedTask` |
//! | [`consensus`] | `ConsensusProposal`, `ConsensusResult`, `VotePolicy` |
//! | [`errors`] | `SwarmError` |

pub mod agent;
pub mod consensus;
pub mod errors;
pub mod pool;
pub mod task;

pub use agent::*;
pub use consensus::*;
pub use errors::*;
pub use pool::*;
pub use task::*;
