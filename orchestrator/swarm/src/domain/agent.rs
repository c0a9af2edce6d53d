// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Aggregate
//!
//! A worker registered with the coordinator under exactly one domain.
//!
//! Lifecycle: `Idle → Busy → Idle | Error`, and `Terminated` once
//! unregistered. Only `Idle` agents receive work; only non-`Error`,
//! non-`Terminated` agents vote in consensus.

use chrono::{DateTime, Utc};
use hive_core::domain::routing::DomainName;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed capability flags plus free-text specializations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub can_generate: bool,
    pub can_review: bool,
    pub can_test: bool,
    pub can_deploy: bool,
    pub can_learn: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specializations: Vec<String>,
}

impl AgentCapabilities {
    /// Conventional capability set for agents serving `domain`.
    pub fn for_domain(domain: DomainName) -> Self {
        let mut caps = Self::default();
        match domain {
            DomainName::Development => caps.can_generate = true,
            DomainName::Quality => {
                caps.can_review = true;
                caps.can_test = true;
            }
            DomainName::Security => caps.can_review = true,
            DomainName::Learning => caps.can_learn = true,
            DomainName::Coordination => caps.can_deploy = true,
        }
        caps
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specializations.push(specialization.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Error,
    Terminated,
}

/// Running per-agent performance figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub average_latency_ms: f64,
    pub success_rate: f64,
}

impl AgentMetrics {
    pub fn total_tasks(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    /// Fold one finished task into the running averages.
    pub fn record(&mut self, latency_ms: u64, success: bool) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        let n = self.total_tasks() as f64;
        self.average_latency_ms += (latency_ms as f64 - self.average_latency_ms) / n;
        self.success_rate = self.tasks_completed as f64 / n;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub domain: DomainName,
    pub capabilities: AgentCapabilities,
    pub status: AgentStatus,
    pub metrics: AgentMetrics,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, domain: DomainName, capabilities: AgentCapabilities) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            domain,
            capabilities,
            status: AgentStatus::Idle,
            metrics: AgentMetrics::default(),
            registered_at: Utc::now(),
        }
    }

    /// Agent with the conventional capabilities for its domain.
    pub fn for_domain(name: impl Into<String>, domain: DomainName) -> Self {
        Self::new(name, domain, AgentCapabilities::for_domain(domain))
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    /// Healthy agents are those not in `Error` and not `Terminated`.
    pub fn is_healthy(&self) -> bool {
        !matches!(self.status, AgentStatus::Error | AgentStatus::Terminated)
    }
}
