// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `hive-swarm` - Domain-Bounded Task Coordination
//!
//! Schedules tasks onto agents grouped by [`DomainName`](hive_core::DomainName)
//! and runs supermajority votes over those agents.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Agent`, `Task`, `DomainPool`, consensus tally |
//! | [`application`] | Application | `Coordinator`, `TaskExecutor` seam |
//!
//! ## Key Concepts
//!
//! - **Domain pool**: the agents of one domain plus a priority queue and a
//!   concurrency cap. Tasks never cross domains.
//! - **Head-of-line blocking**: a queue head that finds no idle agent stays
//!   at the head; nothing behind it is dispatched that tick.
//! - **Consensus**: approval needs `⌈2n/3⌉` yes votes and at least the
//!   proposal's quorum, whichever is larger.
//!
//! Execution is in-process only. There is no preemption and no execution
//! timeout; a running task always reaches `Completed` or `Failed`.

pub mod application;
pub mod domain;

pub use application::*;
pub use domain::*;
