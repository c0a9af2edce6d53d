// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordinator - domain-bounded priority scheduler with consensus voting
//!
//! Every task is routed to exactly one [`DomainName`] and waits in that
//! domain's queue, highest priority first and FIFO among equals. A periodic
//! dispatch tick hands queue heads to idle agents of the same domain while
//! the domain stays under its `max_concurrent` cap. When no agent is idle
//! the head goes back to the front and the domain stops for this tick, so
//! lower-priority work never overtakes it.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Scheduling, agent lifecycle and proposal voting
//! - **Collaborators:** [`TaskExecutor`] runs the work, [`VotePolicy`]
//!   judges proposals, an optional [`EventBus`] receives lifecycle events

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use hive_core::domain::events::Event;
use hive_core::domain::node_config::CoordinatorConfig;
use hive_core::domain::routing::{route_task_type, DomainName};
use hive_core::infrastructure::event_bus::EventBus;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::executor::{ExecutionError, TaskExecutor};
use crate::domain::{
    tally, Agent, AgentId, AgentStatus, ConsensusProposal, ConsensusResult, DomainPool,
    HealthVotePolicy, QueuedTask, SwarmError, Task, TaskDefinition, TaskError, TaskId,
    TaskPriority, TaskResult, TaskStatus, VotePolicy,
};

const EVENT_SOURCE: &str = "coordinator";

#[derive(Debug, Clone, Serialize)]
pub struct DomainStats {
    pub domain: DomainName,
    pub agents: usize,
    pub idle_agents: usize,
    pub queued: usize,
    pub active: usize,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub agents: usize,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    pub tasks_queued: usize,
    pub tasks_in_progress: usize,
    pub average_latency_ms: f64,
    /// Finished tasks per second of uptime.
    pub throughput_per_second: f64,
    pub domains: Vec<DomainStats>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
    executed: u64,
    total_latency_ms: u64,
}

struct SwarmState {
    agents: HashMap<AgentId, Agent>,
    pools: BTreeMap<DomainName, DomainPool>,
    tasks: HashMap<TaskId, Task>,
    waiters: HashMap<TaskId, Vec<oneshot::Sender<TaskResult>>>,
    next_sequence: u64,
    counters: Counters,
}

impl SwarmState {
    fn count_terminal(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Completed => self.counters.completed += 1,
            TaskStatus::Failed => self.counters.failed += 1,
            TaskStatus::Cancelled => self.counters.cancelled += 1,
            _ => {}
        }
    }
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    executor: Arc<dyn TaskExecutor>,
    vote_policy: Arc<dyn VotePolicy>,
    event_bus: Option<EventBus>,
    state: Mutex<SwarmState>,
    shutdown: CancellationToken,
    started_at: Instant,
}

/// Cloneable handle; all clones share one scheduler.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    executor: Arc<dyn TaskExecutor>,
    vote_policy: Arc<dyn VotePolicy>,
    event_bus: Option<EventBus>,
}

impl CoordinatorBuilder {
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn vote_policy(mut self, vote_policy: Arc<dyn VotePolicy>) -> Self {
        self.vote_policy = vote_policy;
        self
    }

    pub fn build(self) -> Coordinator {
        let pools = self
            .config
            .domains
            .iter()
            .map(|(domain, pool)| (*domain, DomainPool::new(*domain, pool.max_concurrent)))
            .collect();

        Coordinator {
            inner: Arc::new(CoordinatorInner {
                config: self.config,
                executor: self.executor,
                vote_policy: self.vote_policy,
                event_bus: self.event_bus,
                state: Mutex::new(SwarmState {
                    agents: HashMap::new(),
                    pools,
                    tasks: HashMap::new(),
                    waiters: HashMap::new(),
                    next_sequence: 0,
                    counters: Counters::default(),
                }),
                shutdown: CancellationToken::new(),
                started_at: Instant::now(),
            }),
        }
    }
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        Self::builder(config, executor).build()
    }

    pub fn builder(config: CoordinatorConfig, executor: Arc<dyn TaskExecutor>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            executor,
            vote_policy: Arc::new(HealthVotePolicy),
            event_bus: None,
        }
    }

    // ----- agents -------------------------------------------------------

    /// Add `agent` to its domain's pool in `Idle` state.
    pub async fn register_agent(&self, mut agent: Agent) -> Result<AgentId, SwarmError> {
        let id = agent.id;
        let domain = agent.domain;
        {
            let mut state = self.inner.state.lock();
            if state.agents.contains_key(&id) {
                return Err(SwarmError::AgentAlreadyRegistered(id));
            }
            let pool = state
                .pools
                .get_mut(&domain)
                .ok_or(SwarmError::DomainNotServed(domain))?;
            pool.add_agent(id);
            agent.status = AgentStatus::Idle;
            state.agents.insert(id, agent);
        }

        info!(agent_id = %id, domain = %domain, "Agent registered");
        self.inner
            .publish("agent:registered", json!({ "agent_id": id, "domain": domain }))
            .await;
        Ok(id)
    }

    /// Remove an agent. A task it is running still completes normally.
    pub async fn unregister_agent(&self, id: AgentId) -> Result<Agent, SwarmError> {
        let agent = self.inner.remove_agent(id)?;
        info!(agent_id = %id, domain = %agent.domain, "Agent unregistered");
        self.inner
            .publish("agent:unregistered", json!({ "agent_id": id, "domain": agent.domain }))
            .await;
        Ok(agent)
    }

    pub fn get_agent(&self, id: AgentId) -> Option<Agent> {
        self.inner.state.lock().agents.get(&id).cloned()
    }

    /// Agents in registration order, optionally limited to one domain.
    pub fn list_agents(&self, domain: Option<DomainName>) -> Vec<Agent> {
        let state = self.inner.state.lock();
        state
            .pools
            .values()
            .filter(|pool| domain.is_none_or(|d| d == pool.name))
            .flat_map(|pool| pool.agents.iter())
            .filter_map(|id| state.agents.get(id).cloned())
            .collect()
    }

    /// Take an agent out of rotation until [`Coordinator::restore_agent`].
    pub fn report_agent_error(&self, id: AgentId) -> Result<(), SwarmError> {
        let mut state = self.inner.state.lock();
        let agent = state.agents.get_mut(&id).ok_or(SwarmError::AgentNotFound(id))?;
        agent.status = AgentStatus::Error;
        warn!(agent_id = %id, "Agent marked as errored");
        Ok(())
    }

    pub fn restore_agent(&self, id: AgentId) -> Result<(), SwarmError> {
        let mut state = self.inner.state.lock();
        let agent = state.agents.get_mut(&id).ok_or(SwarmError::AgentNotFound(id))?;
        if agent.status == AgentStatus::Error {
            agent.status = AgentStatus::Idle;
            info!(agent_id = %id, "Agent restored to idle");
        }
        Ok(())
    }

    /// Shrink `domain` to `count` agents, removing errored agents first, then
    /// idle, then busy, newest first within each group. Growing is left to
    /// whoever constructs agents. Returns the removed agents.
    pub async fn scale_agents(&self, domain: DomainName, count: usize) -> Result<Vec<AgentId>, SwarmError> {
        let victims = {
            let state = self.inner.state.lock();
            let pool = state.pools.get(&domain).ok_or(SwarmError::DomainNotServed(domain))?;
            if pool.agents.len() <= count {
                debug!(domain = %domain, current = pool.agents.len(), requested = count, "Scale-up requested; nothing to remove");
                return Ok(Vec::new());
            }

            let mut ranked: Vec<(u8, usize, AgentId)> = pool
                .agents
                .iter()
                .enumerate()
                .map(|(position, id)| {
                    let rank = match state.agents.get(id).map(|a| a.status) {
                        Some(AgentStatus::Error) | Some(AgentStatus::Terminated) | None => 0,
                        Some(AgentStatus::Idle) => 1,
                        Some(AgentStatus::Busy) => 2,
                    };
                    (rank, position, *id)
                })
                .collect();
            ranked.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
            ranked
                .into_iter()
                .take(pool.agents.len() - count)
                .map(|(_, _, id)| id)
                .collect::<Vec<_>>()
        };

        for id in &victims {
            self.unregister_agent(*id).await?;
        }
        info!(domain = %domain, removed = victims.len(), target = count, "Scaled domain down");
        Ok(victims)
    }

    // ----- tasks --------------------------------------------------------

    /// Route and enqueue a task. Returns immediately; a task whose routed
    /// domain is not served, or that arrives after [`Coordinator::shutdown`],
    /// is returned already `Failed`.
    pub async fn submit_task(&self, definition: TaskDefinition, priority: TaskPriority) -> TaskId {
        let domain = route_task_type(&definition.task_type);
        let task_type = definition.task_type.clone();

        let (id, rejected) = {
            let mut state = self.inner.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.counters.submitted += 1;

            let mut task = Task::new(definition, priority, domain, sequence);
            let id = task.id;

            let served = state.pools.contains_key(&domain);
            let refusal = if self.inner.shutdown.is_cancelled() {
                Some(TaskError::new(TaskError::COORDINATOR_STOPPED, "coordinator is shut down", false))
            } else if task_type.trim().is_empty() {
                Some(TaskError::new(TaskError::ROUTING_FAILED, "task type is empty", false))
            } else if !served {
                Some(TaskError::new(
                    TaskError::ROUTING_FAILED,
                    format!("domain '{}' is not served", domain),
                    false,
                ))
            } else {
                None
            };
            let rejected = if let Some(error) = refusal {
                let result = task.transition(TaskStatus::Failed).map(|_| task.finish(None, Some(error)));
                state.count_terminal(TaskStatus::Failed);
                result.ok()
            } else {
                if let Err(e) = task.transition(TaskStatus::Queued) {
                    error!(task_id = %id, "Failed to queue task: {}", e);
                }
                if let Some(pool) = state.pools.get_mut(&domain) {
                    pool.enqueue(QueuedTask { id, priority, sequence });
                }
                None
            };
            state.tasks.insert(id, task);
            (id, rejected)
        };

        metrics::counter!("hive_tasks_submitted_total", "domain" => domain.as_str()).increment(1);
        self.inner
            .publish(
                "task:submitted",
                json!({ "task_id": id, "task_type": task_type, "domain": domain, "priority": priority }),
            )
            .await;

        match rejected {
            Some(result) => {
                warn!(task_id = %id, task_type = %task_type, "Task rejected at submission");
                metrics::counter!("hive_tasks_finished_total", "status" => "failed").increment(1);
                self.inner
                    .publish("task:failed", serde_json::to_value(&result).unwrap_or_default())
                    .await;
            }
            None => debug!(task_id = %id, domain = %domain, ?priority, "Task queued"),
        }
        id
    }

    /// Wait for a task to finish. Completed tasks resolve with their result;
    /// failed and cancelled tasks become errors.
    pub async fn await_task(&self, id: TaskId) -> Result<TaskResult, SwarmError> {
        let receiver = {
            let mut state = self.inner.state.lock();
            let task = state.tasks.get(&id).ok_or(SwarmError::TaskNotFound(id))?;
            if let Some(result) = task.result.clone().filter(|_| task.status().is_terminal()) {
                return settle(result);
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.entry(id).or_default().push(tx);
            rx
        };

        match receiver.await {
            Ok(result) => settle(result),
            Err(_) => Err(SwarmError::TaskAbandoned(id)),
        }
    }

    /// Cancel a queued task. Returns `false` for any other state; running
    /// tasks are never interrupted.
    pub async fn cancel_task(&self, id: TaskId) -> bool {
        let (result, waiters) = {
            let mut state = self.inner.state.lock();
            let Some(task) = state.tasks.get_mut(&id) else {
                return false;
            };
            if task.status() != TaskStatus::Queued || task.transition(TaskStatus::Cancelled).is_err() {
                return false;
            }
            let result = task.finish(None, None);
            let domain = task.domain;
            if let Some(pool) = state.pools.get_mut(&domain) {
                pool.remove(id);
            }
            state.count_terminal(TaskStatus::Cancelled);
            let waiters = state.waiters.remove(&id).unwrap_or_default();
            (result, waiters)
        };

        info!(task_id = %id, "Task cancelled");
        metrics::counter!("hive_tasks_finished_total", "status" => "cancelled").increment(1);
        self.inner
            .publish("task:cancelled", serde_json::to_value(&result).unwrap_or_default())
            .await;
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        true
    }

    pub fn get_task_status(&self, id: TaskId) -> Option<TaskStatus> {
        self.inner.state.lock().tasks.get(&id).map(Task::status)
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.inner.state.lock().tasks.get(&id).cloned()
    }

    /// Tasks in submission order.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<Task> {
        let state = self.inner.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| status.is_none_or(|s| t.status() == s))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.sequence);
        tasks
    }

    // ----- dispatch -----------------------------------------------------

    /// Run one dispatch pass over every domain. Returns the number of tasks
    /// started.
    pub fn dispatch_tick(&self) -> usize {
        if self.inner.shutdown.is_cancelled() {
            return 0;
        }

        let mut launches = Vec::new();
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            for pool in state.pools.values_mut() {
                while pool.has_capacity() {
                    let Some(entry) = pool.pop() else { break };

                    let idle = pool
                        .agents
                        .iter()
                        .copied()
                        .find(|id| state.agents.get(id).is_some_and(Agent::is_idle));
                    let Some(agent_id) = idle else {
                        pool.push_front(entry);
                        break;
                    };

                    let Some(task) = state.tasks.get_mut(&entry.id) else {
                        continue;
                    };
                    if let Err(e) = task.transition(TaskStatus::InProgress) {
                        warn!(task_id = %entry.id, "Dropping queue entry: {}", e);
                        continue;
                    }
                    task.assigned_agent = Some(agent_id);

                    let Some(agent) = state.agents.get_mut(&agent_id) else {
                        continue;
                    };
                    agent.status = AgentStatus::Busy;
                    pool.active += 1;
                    launches.push((agent.clone(), task.clone()));
                }
                metrics::gauge!("hive_domain_active", "domain" => pool.name.as_str()).set(pool.active as f64);
            }
        }

        let started = launches.len();
        for (agent, task) in launches {
            debug!(task_id = %task.id, agent_id = %agent.id, domain = %task.domain, "Dispatching task");
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.run_task(agent, task).await });
        }
        started
    }

    /// Spawn the periodic dispatch loop. Stops on [`Coordinator::shutdown`].
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.run().await })
    }

    async fn run(&self) {
        let period = Duration::from_millis(self.inner.config.tick_interval_ms.max(1));
        info!(tick_interval_ms = period.as_millis() as u64, "Starting coordinator dispatch loop");

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let started = self.dispatch_tick();
                    if started > 0 {
                        debug!(started, "Dispatch tick started tasks");
                    }
                }
                _ = self.inner.shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping coordinator dispatch loop");
                    break;
                }
            }
        }
    }

    /// Stop dispatching. Running tasks finish; every queued task is
    /// cancelled, and awaiting it yields [`SwarmError::TaskAbandoned`].
    /// Later submissions are rejected. Returns the number of tasks cancelled.
    pub async fn shutdown(&self) -> usize {
        self.inner.shutdown.cancel();

        let abandoned = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let queued: Vec<TaskId> = state
                .pools
                .values_mut()
                .flat_map(|pool| pool.drain_queue())
                .map(|entry| entry.id)
                .collect();

            let mut abandoned = Vec::with_capacity(queued.len());
            for id in queued {
                let Some(task) = state.tasks.get_mut(&id) else {
                    continue;
                };
                if let Err(e) = task.transition(TaskStatus::Cancelled) {
                    warn!(task_id = %id, "Skipping queued task at shutdown: {}", e);
                    continue;
                }
                let error = TaskError::new(
                    TaskError::COORDINATOR_STOPPED,
                    "coordinator shut down before dispatch",
                    false,
                );
                let result = task.finish(None, Some(error));
                state.count_terminal(TaskStatus::Cancelled);
                let waiters = state.waiters.remove(&id).unwrap_or_default();
                abandoned.push((result, waiters));
            }
            abandoned
        };

        let count = abandoned.len();
        info!(abandoned = count, "Coordinator shut down");
        for (result, waiters) in abandoned {
            metrics::counter!("hive_tasks_finished_total", "status" => "cancelled").increment(1);
            self.inner
                .publish("task:cancelled", serde_json::to_value(&result).unwrap_or_default())
                .await;
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
        count
    }

    // ----- consensus ----------------------------------------------------

    /// Put `proposal` to every agent registered in the domains it concerns.
    pub async fn propose_decision(&self, proposal: ConsensusProposal) -> ConsensusResult {
        let votes = {
            let state = self.inner.state.lock();
            proposal
                .proposal_type
                .domains()
                .iter()
                .filter_map(|domain| state.pools.get(domain))
                .flat_map(|pool| pool.agents.iter())
                .filter_map(|id| state.agents.get(id))
                .map(|agent| self.inner.vote_policy.cast(agent, &proposal))
                .collect::<Vec<_>>()
        };

        let result = tally(&proposal, votes);
        info!(
            proposal_type = proposal.proposal_type.as_str(),
            voters = result.votes.len(),
            approval_rate = result.approval_rate,
            approved = result.approved,
            "Consensus decided"
        );
        self.inner
            .publish(
                "consensus:decided",
                json!({
                    "proposal_type": proposal.proposal_type,
                    "approved": result.approved,
                    "approval_rate": result.approval_rate,
                    "voters": result.votes.len(),
                }),
            )
            .await;
        result
    }

    pub fn get_stats(&self) -> CoordinatorStats {
        let state = self.inner.state.lock();
        let domains = state
            .pools
            .values()
            .map(|pool| DomainStats {
                domain: pool.name,
                agents: pool.agents.len(),
                idle_agents: pool
                    .agents
                    .iter()
                    .filter(|id| state.agents.get(id).is_some_and(Agent::is_idle))
                    .count(),
                queued: pool.queue_len(),
                active: pool.active,
                max_concurrent: pool.max_concurrent,
            })
            .collect::<Vec<DomainStats>>();

        let counters = &state.counters;
        let uptime = self.inner.started_at.elapsed();
        let finished = counters.completed + counters.failed + counters.cancelled;
        CoordinatorStats {
            agents: state.agents.len(),
            tasks_submitted: counters.submitted,
            tasks_completed: counters.completed,
            tasks_failed: counters.failed,
            tasks_cancelled: counters.cancelled,
            tasks_queued: domains.iter().map(|d| d.queued).sum(),
            tasks_in_progress: domains.iter().map(|d| d.active).sum(),
            average_latency_ms: if counters.executed == 0 {
                0.0
            } else {
                counters.total_latency_ms as f64 / counters.executed as f64
            },
            throughput_per_second: finished as f64 / uptime.as_secs_f64().max(1e-3),
            domains,
            uptime_seconds: uptime.as_secs(),
        }
    }
}

impl CoordinatorInner {
    fn remove_agent(&self, id: AgentId) -> Result<Agent, SwarmError> {
        let mut state = self.state.lock();
        let mut agent = state.agents.remove(&id).ok_or(SwarmError::AgentNotFound(id))?;
        if let Some(pool) = state.pools.get_mut(&agent.domain) {
            pool.remove_agent(id);
        }
        agent.status = AgentStatus::Terminated;
        Ok(agent)
    }

    async fn publish(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(bus) = &self.event_bus {
            bus.emit(Event::new(event_type, payload, EVENT_SOURCE)).await;
        }
    }

    async fn run_task(&self, agent: Agent, task: Task) {
        self.publish(
            "task:started",
            json!({ "task_id": task.id, "agent_id": agent.id, "domain": task.domain }),
        )
        .await;

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.executor.execute(&agent, &task))
            .catch_unwind()
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (output, failure, agent_fault) = match outcome {
            Ok(Ok(output)) => (Some(output), None, false),
            Ok(Err(ExecutionError::Task { code, message })) => {
                (None, Some(TaskError::new(code, message, true)), false)
            }
            Ok(Err(ExecutionError::AgentFault(message))) => {
                (None, Some(TaskError::new(TaskError::AGENT_FAULT, message, true)), true)
            }
            Err(_) => (
                None,
                Some(TaskError::new(TaskError::EXECUTOR_PANIC, "executor panicked", false)),
                true,
            ),
        };
        let success = failure.is_none();

        let (result, waiters) = {
            let mut state = self.state.lock();
            if let Some(pool) = state.pools.get_mut(&task.domain) {
                pool.active = pool.active.saturating_sub(1);
                metrics::gauge!("hive_domain_active", "domain" => pool.name.as_str()).set(pool.active as f64);
            }
            state.counters.executed += 1;
            state.counters.total_latency_ms += latency_ms;
            if let Some(record) = state.agents.get_mut(&agent.id) {
                record.metrics.record(latency_ms, success);
                if record.status == AgentStatus::Busy {
                    record.status = if agent_fault { AgentStatus::Error } else { AgentStatus::Idle };
                }
            }

            let terminal = if success { TaskStatus::Completed } else { TaskStatus::Failed };
            let Some(record) = state.tasks.get_mut(&task.id) else {
                error!(task_id = %task.id, "Finished task vanished from the task table");
                return;
            };
            if let Err(e) = record.transition(terminal) {
                error!(task_id = %task.id, "Cannot record task outcome: {}", e);
                return;
            }
            let result = record.finish(output, failure);
            state.count_terminal(terminal);
            let waiters = state.waiters.remove(&task.id).unwrap_or_default();
            (result, waiters)
        };

        let status = if success { "completed" } else { "failed" };
        metrics::counter!("hive_tasks_finished_total", "status" => status).increment(1);
        metrics::histogram!("hive_task_duration_ms").record(latency_ms as f64);

        if success {
            info!(task_id = %task.id, agent_id = %agent.id, latency_ms, "Task completed");
        } else if agent_fault {
            warn!(task_id = %task.id, agent_id = %agent.id, "Task failed on faulty agent; agent taken out of rotation");
        } else {
            warn!(task_id = %task.id, agent_id = %agent.id, "Task failed: {:?}", result.error);
        }

        self.publish(
            &format!("task:{}", status),
            serde_json::to_value(&result).unwrap_or_default(),
        )
        .await;

        // Waiters resolve only after the outcome event is out.
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

fn settle(result: TaskResult) -> Result<TaskResult, SwarmError> {
    match result.status {
        TaskStatus::Completed => Ok(result),
        TaskStatus::Cancelled
            if result
                .error
                .as_ref()
                .is_some_and(|e| e.code == TaskError::COORDINATOR_STOPPED) =>
        {
            Err(SwarmError::TaskAbandoned(result.task_id))
        }
        TaskStatus::Cancelled => Err(SwarmError::TaskCancelled(result.task_id)),
        _ => Err(SwarmError::TaskFailed {
            task_id: result.task_id,
            error: result
                .error
                .unwrap_or_else(|| TaskError::new(TaskError::EXECUTION_FAILED, "unknown failure", false)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_core::domain::node_config::DomainPoolConfig;

    struct EchoExecutor;

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        async fn execute(&self, _agent: &Agent, task: &Task) -> Result<serde_json::Value, ExecutionError> {
            Ok(task.definition.input.clone())
        }
    }

    fn config(domains: &[(DomainName, usize)]) -> CoordinatorConfig {
        CoordinatorConfig {
            tick_interval_ms: 10,
            domains: domains
                .iter()
                .map(|(d, n)| (*d, DomainPoolConfig { max_concurrent: *n }))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_register_requires_served_domain() {
        let coordinator = Coordinator::new(config(&[(DomainName::Development, 1)]), Arc::new(EchoExecutor));

        let agent = Agent::for_domain("dev", DomainName::Development);
        let id = coordinator.register_agent(agent.clone()).await.unwrap();
        assert!(matches!(
            coordinator.register_agent(agent).await,
            Err(SwarmError::AgentAlreadyRegistered(dup)) if dup == id
        ));
        assert!(matches!(
            coordinator.register_agent(Agent::for_domain("sec", DomainName::Security)).await,
            Err(SwarmError::DomainNotServed(DomainName::Security))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_without_agents_keeps_task_queued() {
        let coordinator = Coordinator::new(config(&[(DomainName::Development, 2)]), Arc::new(EchoExecutor));
        let id = coordinator
            .submit_task(TaskDefinition::new("code-generation", "write it"), TaskPriority::High)
            .await;

        assert_eq!(coordinator.dispatch_tick(), 0);
        assert_eq!(coordinator.get_task_status(id), Some(TaskStatus::Queued));
        assert_eq!(coordinator.get_stats().domains[0].queued, 1);
    }

    #[tokio::test]
    async fn test_completed_task_resolves_await() {
        let coordinator = Coordinator::new(config(&[(DomainName::Quality, 1)]), Arc::new(EchoExecutor));
        coordinator
            .register_agent(Agent::for_domain("qa", DomainName::Quality))
            .await
            .unwrap();

        let id = coordinator
            .submit_task(
                TaskDefinition::new("code-review", "review").with_input(json!({"ok": true})),
                TaskPriority::Medium,
            )
            .await;
        assert_eq!(coordinator.dispatch_tick(), 1);

        let result = coordinator.await_task(id).await.unwrap();
        assert_eq!(result.output, Some(json!({"ok": true})));
        assert!(result.agent_id.is_some());

        // A second await on a finished task resolves immediately.
        assert!(coordinator.await_task(id).await.is_ok());

        let stats = coordinator.get_stats();
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.domains[0].active, 0);
    }

    #[tokio::test]
    async fn test_report_and_restore_agent() {
        let coordinator = Coordinator::new(config(&[(DomainName::Learning, 1)]), Arc::new(EchoExecutor));
        let id = coordinator
            .register_agent(Agent::for_domain("learner", DomainName::Learning))
            .await
            .unwrap();

        coordinator.report_agent_error(id).unwrap();
        coordinator
            .submit_task(TaskDefinition::new("pattern-learning", "learn"), TaskPriority::Low)
            .await;
        assert_eq!(coordinator.dispatch_tick(), 0);

        coordinator.restore_agent(id).unwrap();
        assert_eq!(coordinator.dispatch_tick(), 1);
        assert!(coordinator.report_agent_error(AgentId::new()).is_err());
    }
}
