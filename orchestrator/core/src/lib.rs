// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `hive-core` - Shared Kernel
//!
//! Vocabulary and plumbing shared by every hive crate:
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain::events`] | Domain | `Event`, `EventPattern`, `EventFilter` |
//! | [`domain::routing`] | Domain | `DomainName`, static task-type routing table |
//! | [`domain::node_config`] | Domain | `HiveConfig` manifest and its sections |
//! | [`infrastructure::event_bus`] | Infrastructure | Cross-domain `EventBus` |

pub mod domain;
pub mod infrastructure;

pub use domain::*;
