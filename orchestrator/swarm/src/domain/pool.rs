// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Pool
//!
//! Per-domain scheduling state: the member agents, the priority queue of
//! waiting tasks and the count of in-flight tasks bounded by
//! `max_concurrent`.

use hive_core::domain::routing::DomainName;
use std::cmp::Reverse;
use std::collections::VecDeque;

use super::agent::AgentId;
use super::task::{TaskId, TaskPriority};

/// Queue entry. Ordering key is `(Reverse(priority), sequence)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedTask {
    pub id: TaskId,
    pub priority: TaskPriority,
    pub sequence: u64,
}

impl QueuedTask {
    fn key(&self) -> (Reverse<TaskPriority>, u64) {
        (Reverse(self.priority), self.sequence)
    }
}

#[derive(Debug, Clone)]
pub struct DomainPool {
    pub name: DomainName,
    /// Registration order.
    pub agents: Vec<AgentId>,
    queue: VecDeque<QueuedTask>,
    pub active: usize,
    pub max_concurrent: usize,
}

impl DomainPool {
    pub fn new(name: DomainName, max_concurrent: usize) -> Self {
        Self {
            name,
            agents: Vec::new(),
            queue: VecDeque::new(),
            active: 0,
            max_concurrent,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.active < self.max_concurrent
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> impl Iterator<Item = &QueuedTask> {
        self.queue.iter()
    }

    /// Insert keeping highest priority first, FIFO among equals.
    pub fn enqueue(&mut self, entry: QueuedTask) {
        let key = entry.key();
        let at = self.queue.partition_point(|queued| queued.key() <= key);
        self.queue.insert(at, entry);
    }

    pub fn pop(&mut self) -> Option<QueuedTask> {
        self.queue.pop_front()
    }

    /// Return a popped entry to the head without disturbing order.
    pub fn push_front(&mut self, entry: QueuedTask) {
        self.queue.push_front(entry);
    }

    /// Empty the queue, highest priority first.
    pub fn drain_queue(&mut self) -> Vec<QueuedTask> {
        self.queue.drain(..).collect()
    }

    pub fn remove(&mut self, id: TaskId) -> Option<QueuedTask> {
        let at = self.queue.iter().position(|queued| queued.id == id)?;
        self.queue.remove(at)
    }

    pub fn add_agent(&mut self, id: AgentId) {
        self.agents.push(id);
    }

    pub fn remove_agent(&mut self, id: AgentId) -> bool {
        let before = self.agents.len();
        self.agents.retain(|agent| *agent != id);
        self.agents.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: TaskPriority, sequence: u64) -> QueuedTask {
        QueuedTask {
            id: TaskId::new(),
            priority,
            sequence,
        }
    }

    #[test]
    fn test_queue_orders_by_priority_then_sequence() {
        let mut pool = DomainPool::new(DomainName::Development, 2);
        pool.enqueue(entry(TaskPriority::Low, 0));
        pool.enqueue(entry(TaskPriority::High, 1));
        pool.enqueue(entry(TaskPriority::Medium, 2));
        pool.enqueue(entry(TaskPriority::High, 3));
        pool.enqueue(entry(TaskPriority::Critical, 4));

        let order: Vec<(TaskPriority, u64)> = std::iter::from_fn(|| pool.pop())
            .map(|e| (e.priority, e.sequence))
            .collect();
        assert_eq!(
            order,
            vec![
                (TaskPriority::Critical, 4),
                (TaskPriority::High, 1),
                (TaskPriority::High, 3),
                (TaskPriority::Medium, 2),
                (TaskPriority::Low, 0),
            ]
        );
    }

    #[test]
    fn test_push_front_and_remove() {
        let mut pool = DomainPool::new(DomainName::Quality, 1);
        let first = entry(TaskPriority::High, 0);
        let second = entry(TaskPriority::Low, 1);
        pool.enqueue(first);
        pool.enqueue(second);

        let head = pool.pop().unwrap();
        pool.push_front(head);
        assert_eq!(pool.queued().next().map(|e| e.id), Some(first.id));

        assert!(pool.remove(second.id).is_some());
        assert!(pool.remove(second.id).is_none());
        assert_eq!(pool.queue_len(), 1);
    }

    #[test]
    fn test_drain_queue_empties_in_dispatch_order() {
        let mut pool = DomainPool::new(DomainName::Learning, 1);
        let low = entry(TaskPriority::Low, 0);
        let high = entry(TaskPriority::High, 1);
        pool.enqueue(low);
        pool.enqueue(high);

        let drained: Vec<TaskId> = pool.drain_queue().into_iter().map(|e| e.id).collect();
        assert_eq!(drained, vec![high.id, low.id]);
        assert_eq!(pool.queue_len(), 0);
        assert!(pool.pop().is_none());
    }

    #[test]
    fn test_capacity() {
        let mut pool = DomainPool::new(DomainName::Security, 1);
        assert!(pool.has_capacity());
        pool.active = 1;
        assert!(!pool.has_capacity());
    }
}
