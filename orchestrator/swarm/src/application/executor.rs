// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task execution seam.
//!
//! The coordinator owns scheduling only; running a task on an agent is
//! delegated to whatever [`TaskExecutor`] the embedding application supplies.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Agent, Task};

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The task itself failed; the agent stays usable.
    #[error("[{code}] {message}")]
    Task { code: String, message: String },

    /// The agent is broken and should stop receiving work.
    #[error("agent fault: {0}")]
    AgentFault(String),
}

impl ExecutionError {
    pub fn task(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(err: anyhow::Error) -> Self {
        Self::task(crate::domain::TaskError::EXECUTION_FAILED, format!("{:#}", err))
    }
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<serde_json::Value, ExecutionError>;
}
