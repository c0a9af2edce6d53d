// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Routing Vocabulary
//!
//! Every task type maps to exactly one [`DomainName`] through a static lookup
//! table. Types missing from the table fall back to [`DomainName::Development`].
//!
//! The table is shared by the coordinator (queue selection) and by consensus
//! (voter pool selection), so it lives in the core crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named bounded-concurrency pool of agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainName {
    Development,
    Quality,
    Security,
    Learning,
    Coordination,
}

impl DomainName {
    /// All domains in dispatch order.
    pub const ALL: [DomainName; 5] = [
        DomainName::Development,
        DomainName::Quality,
        DomainName::Security,
        DomainName::Learning,
        DomainName::Coordination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainName::Development => "development",
            DomainName::Quality => "quality",
            DomainName::Security => "security",
            DomainName::Learning => "learning",
            DomainName::Coordination => "coordination",
        }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain '{0}'")]
pub struct UnknownDomain(pub String);

impl FromStr for DomainName {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(DomainName::Development),
            "quality" => Ok(DomainName::Quality),
            "security" => Ok(DomainName::Security),
            "learning" => Ok(DomainName::Learning),
            "coordination" => Ok(DomainName::Coordination),
            other => Err(UnknownDomain(other.to_string())),
        }
    }
}

/// Static task-type → domain table.
const TASK_ROUTES: &[(&str, DomainName)] = &[
    ("code-generation", DomainName::Development),
    ("refactoring", DomainName::Development),
    ("bug-fix", DomainName::Development),
    ("documentation", DomainName::Development),
    ("test-generation", DomainName::Quality),
    ("test-execution", DomainName::Quality),
    ("code-review", DomainName::Quality),
    ("coverage-analysis", DomainName::Quality),
    ("performance-testing", DomainName::Quality),
    ("security-scan", DomainName::Security),
    ("vulnerability-assessment", DomainName::Security),
    ("compliance-check", DomainName::Security),
    ("pattern-learning", DomainName::Learning),
    ("model-training", DomainName::Learning),
    ("knowledge-distillation", DomainName::Learning),
    ("task-orchestration", DomainName::Coordination),
    ("resource-planning", DomainName::Coordination),
    ("deployment", DomainName::Coordination),
];

/// Resolve the domain a task type is served by.
pub fn route_task_type(task_type: &str) -> DomainName {
    TASK_ROUTES
        .iter()
        .find(|(name, _)| *name == task_type)
        .map(|(_, domain)| *domain)
        .unwrap_or(DomainName::Development)
}

/// Every explicitly routed task type with its domain, in table order.
pub fn routed_task_types() -> impl Iterator<Item = (&'static str, DomainName)> {
    TASK_ROUTES.iter().copied()
}

/// Whether `task_type` has an explicit entry in the routing table.
pub fn is_routed(task_type: &str) -> bool {
    TASK_ROUTES.iter().any(|(name, _)| *name == task_type)
}
