// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Aggregate
//!
//! Status moves strictly forward:
//!
//! ```text
//! Pending → Queued → InProgress → Completed | Failed
//!              └──→ Cancelled
//! Pending → Failed            (routing rejection, never queued)
//! ```

use chrono::{DateTime, Utc};
use hive_core::domain::routing::DomainName;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::agent::AgentId;
use super::errors::SwarmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered so that `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Pending, Failed)
                | (Queued, InProgress)
                | (Queued, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }
}

/// What to do: a routed type, a human description and an opaque input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_type: String,
    pub description: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl TaskDefinition {
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            description: description.into(),
            input: serde_json::Value::Null,
        }
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }
}

/// Structured failure attached to a failed task result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

impl TaskError {
    pub const ROUTING_FAILED: &'static str = "ROUTING_FAILED";
    pub const EXECUTION_FAILED: &'static str = "EXECUTION_FAILED";
    pub const EXECUTOR_PANIC: &'static str = "EXECUTOR_PANIC";
    pub const AGENT_FAULT: &'static str = "AGENT_FAULT";
    pub const COORDINATOR_STOPPED: &'static str = "COORDINATOR_STOPPED";

    pub fn new(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub definition: TaskDefinition,
    pub priority: TaskPriority,
    pub domain: DomainName,
    status: TaskStatus,
    /// Submission order; breaks ties between equal priorities.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_agent: Option<AgentId>,
    pub result: Option<TaskResult>,
}

impl Task {
    pub fn new(definition: TaskDefinition, priority: TaskPriority, domain: DomainName, sequence: u64) -> Self {
        Self {
            id: TaskId::new(),
            definition,
            priority,
            domain,
            status: TaskStatus::Pending,
            sequence,
            created_at: Utc::now(),
            queued_at: None,
            started_at: None,
            completed_at: None,
            assigned_agent: None,
            result: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Move to `next`, stamping the matching timestamp.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), SwarmError> {
        if !self.status.can_transition_to(next) {
            return Err(SwarmError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            TaskStatus::Queued => self.queued_at = Some(now),
            TaskStatus::InProgress => self.started_at = Some(now),
            _ => self.completed_at = Some(now),
        }
        self.status = next;
        Ok(())
    }

    /// Record the terminal outcome. The status must already be terminal.
    pub fn finish(&mut self, output: Option<serde_json::Value>, error: Option<TaskError>) -> TaskResult {
        let duration_ms = match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        };
        let result = TaskResult {
            task_id: self.id,
            status: self.status,
            output,
            error,
            agent_id: self.assigned_agent,
            duration_ms,
        };
        self.result = Some(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskDefinition::new("code-review", "review"), TaskPriority::Medium, DomainName::Quality, 0)
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = task();
        task.transition(TaskStatus::Queued).unwrap();
        task.transition(TaskStatus::InProgress).unwrap();
        task.transition(TaskStatus::Completed).unwrap();

        assert!(task.queued_at.is_some());
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());
        assert!(task.status().is_terminal());
    }

    #[test]
    fn test_transitions_never_skip_or_reverse() {
        let mut task = task();
        assert!(task.transition(TaskStatus::InProgress).is_err());
        assert!(task.transition(TaskStatus::Completed).is_err());
        assert!(task.transition(TaskStatus::Cancelled).is_err());

        task.transition(TaskStatus::Queued).unwrap();
        assert!(task.transition(TaskStatus::Pending).is_err());
        task.transition(TaskStatus::InProgress).unwrap();
        assert!(task.transition(TaskStatus::Cancelled).is_err());
        assert!(task.transition(TaskStatus::Queued).is_err());

        task.transition(TaskStatus::Failed).unwrap();
        assert!(task.transition(TaskStatus::Completed).is_err());
    }

    #[test]
    fn test_cancel_shortcut_from_queued() {
        let mut task = task();
        task.transition(TaskStatus::Queued).unwrap();
        task.transition(TaskStatus::Cancelled).unwrap();
        let result = task.finish(None, None);
        assert_eq!(result.status, TaskStatus::Cancelled);
        assert_eq!(result.duration_ms, None);
    }
}
