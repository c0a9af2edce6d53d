// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use hive_core::domain::routing::DomainName;
use thiserror::Error;

use super::agent::AgentId;
use super::task::{TaskError, TaskId, TaskStatus};

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Agent already registered: {0}")]
    AgentAlreadyRegistered(AgentId),

    #[error("Domain '{0}' is not served by this coordinator")]
    DomainNotServed(DomainName),

    #[error("Task {task_id}: invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {task_id} failed: {error}")]
    TaskFailed { task_id: TaskId, error: TaskError },

    #[error("Task {0} was cancelled")]
    TaskCancelled(TaskId),

    #[error("Coordinator shut down before task {0} finished")]
    TaskAbandoned(TaskId),
}
