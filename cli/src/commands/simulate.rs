// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process swarm simulation
//!
//! Wires a coordinator, pattern memory and event bus from the loaded
//! configuration, drives a batch of randomly typed tasks through simulated
//! agents, and feeds every outcome back into memory as reinforcement.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use colored::Colorize;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use hive_core::domain::node_config::HiveConfig;
use hive_core::domain::routing::{routed_task_types, DomainName};
use hive_core::infrastructure::event_bus::{EventBus, EventBusStats};
use hive_cortex::{MemoryService, MemoryStats, PatternDraft, PatternId, StandardMemoryService};
use hive_swarm::{
    Agent, ConsensusProposal, ConsensusResult, Coordinator, CoordinatorStats, ExecutionError,
    ProposalType, SwarmError, Task, TaskDefinition, TaskExecutor, TaskPriority,
};

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Agents registered in every configured domain
    #[arg(long, default_value_t = 2)]
    pub agents_per_domain: usize,

    /// Number of tasks to submit
    #[arg(short = 'n', long, default_value_t = 50)]
    pub tasks: usize,

    /// Probability that a simulated agent fails a task
    #[arg(long, default_value_t = 0.1)]
    pub failure_rate: f64,

    /// Upper bound for simulated task latency
    #[arg(long, default_value_t = 25)]
    pub max_latency_ms: u64,

    /// RNG seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub consensus: ConsensusResult,
    pub patterns_merged: usize,
    pub coordinator: CoordinatorStats,
    pub memory: MemoryStats,
    pub event_bus: EventBusStats,
}

/// Agent stand-in with random latency and a fixed failure probability.
struct SimulatedExecutor {
    rng: Mutex<StdRng>,
    failure_rate: f64,
    max_latency_ms: u64,
}

impl SimulatedExecutor {
    fn new(rng: StdRng, failure_rate: f64, max_latency_ms: u64) -> Self {
        Self {
            rng: Mutex::new(rng),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            max_latency_ms,
        }
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<serde_json::Value, ExecutionError> {
        let (latency_ms, fail) = {
            let mut rng = self.rng.lock();
            (rng.random_range(0..=self.max_latency_ms), rng.random_bool(self.failure_rate))
        };
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        if fail {
            return Err(ExecutionError::task(
                "SIMULATED_FAILURE",
                format!("{} gave up on {}", agent.name, task.definition.task_type),
            ));
        }
        Ok(json!({
            "agent": agent.name,
            "task_type": task.definition.task_type,
            "latency_ms": latency_ms,
        }))
    }
}

pub async fn execute(args: SimulateArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = HiveConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let report = run_simulation(&config, &args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Run one full simulation against `config` and collect the resulting stats.
pub async fn run_simulation(config: &HiveConfig, args: &SimulateArgs) -> Result<SimulationReport> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let bus = EventBus::new(config.spec.event_bus.max_history);
    let executor = Arc::new(SimulatedExecutor::new(
        StdRng::seed_from_u64(rng.random()),
        args.failure_rate,
        args.max_latency_ms,
    ));
    let coordinator = Coordinator::builder(config.spec.coordinator.clone(), executor)
        .event_bus(bus.clone())
        .build();
    let memory = Arc::new(StandardMemoryService::new(config.spec.memory.clone()).with_event_bus(bus.clone()));
    memory.subscribe_to_shared_patterns(&bus)?;

    for domain in config.spec.coordinator.domains.keys() {
        for n in 0..args.agents_per_domain {
            coordinator
                .register_agent(Agent::for_domain(format!("{}-{}", domain, n + 1), *domain))
                .await?;
        }
    }
    info!(agents = coordinator.list_agents(None).len(), "Registered simulated agents");

    let task_types: Vec<(&'static str, DomainName)> = routed_task_types()
        .filter(|(_, domain)| config.spec.coordinator.domains.contains_key(domain))
        .collect();
    anyhow::ensure!(!task_types.is_empty(), "No configured domain serves any routed task type");

    let patterns = seed_patterns(&memory, &task_types).await?;

    let loop_handle = coordinator.start();

    const PRIORITIES: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Critical,
    ];
    let mut submitted = Vec::with_capacity(args.tasks);
    for n in 0..args.tasks {
        let Some((task_type, _)) = task_types.choose(&mut rng) else {
            break;
        };
        let priority = PRIORITIES.choose(&mut rng).copied().unwrap_or(TaskPriority::Medium);
        let definition = TaskDefinition::new(*task_type, format!("simulated {} #{}", task_type, n + 1))
            .with_input(json!({ "sequence": n }));
        let id = coordinator.submit_task(definition, priority).await;
        submitted.push((id, *task_type));
    }

    let (mut completed, mut failed, mut abandoned) = (0, 0, 0);
    for (id, task_type) in submitted {
        let success = match coordinator.await_task(id).await {
            Ok(_) => {
                completed += 1;
                true
            }
            Err(SwarmError::TaskFailed { error, .. }) => {
                debug!(task_id = %id, %error, "Simulated task failed");
                failed += 1;
                false
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Simulated task did not finish");
                abandoned += 1;
                continue;
            }
        };

        if let Some(pattern_id) = patterns.get(task_type) {
            if success {
                memory.record_success(*pattern_id).await?;
            } else {
                memory.record_failure(*pattern_id).await?;
            }
        }
    }

    let consensus = coordinator
        .propose_decision(ConsensusProposal::new(
            ProposalType::ResourceAllocation,
            json!({ "action": "rebalance", "completed": completed, "failed": failed }),
        ))
        .await;

    let patterns_merged = memory.consolidate_patterns().await?;

    coordinator.shutdown().await;
    if let Err(e) = loop_handle.await {
        warn!("Coordinator loop ended abnormally: {}", e);
    }

    Ok(SimulationReport {
        completed,
        failed,
        abandoned,
        consensus,
        patterns_merged,
        coordinator: coordinator.get_stats(),
        memory: memory.get_stats().await,
        event_bus: bus.stats(),
    })
}

/// One pattern per task type, embedded from its name. Each type also gets a
/// low-confidence near-duplicate so the dream cycle has work to do.
async fn seed_patterns(
    memory: &StandardMemoryService,
    task_types: &[(&'static str, DomainName)],
) -> Result<HashMap<&'static str, PatternId>> {
    let embedder = memory.embedder();
    let gold = memory.config().tiers.gold;
    let mut patterns = HashMap::new();

    for (task_type, domain) in task_types {
        let embedding = embedder.embed(task_type).await?;
        let id = memory
            .store_pattern(
                PatternDraft::new(*task_type, json!({ "playbook": format!("default {} playbook", task_type) }))
                    .with_embedding(embedding.clone())
                    .with_confidence(gold)
                    .with_source("simulation")
                    .with_metadata("domain", json!(domain.as_str())),
            )
            .await?;
        patterns.insert(*task_type, id);

        memory
            .store_pattern(
                PatternDraft::new(*task_type, json!({ "playbook": format!("draft {} playbook", task_type) }))
                    .with_embedding(embedding)
                    .with_confidence(0.3)
                    .with_source("simulation")
                    .with_usage(1, 1.0),
            )
            .await?;
    }
    Ok(patterns)
}

fn print_report(report: &SimulationReport) {
    println!("{}", "Tasks:".bold());
    println!("  Completed: {}", report.completed.to_string().green());
    println!("  Failed: {}", report.failed.to_string().red());
    if report.abandoned > 0 {
        println!("  Abandoned: {}", report.abandoned.to_string().yellow());
    }
    println!(
        "  Average latency: {:.1}ms, throughput: {:.2}/s",
        report.coordinator.average_latency_ms, report.coordinator.throughput_per_second
    );
    println!();

    println!("{}", "Domains:".bold());
    for domain in &report.coordinator.domains {
        println!(
            "  {} agents={} idle={} queued={} active={}/{}",
            domain.domain.as_str().bold(),
            domain.agents,
            domain.idle_agents,
            domain.queued,
            domain.active,
            domain.max_concurrent
        );
    }
    println!();

    println!("{}", "Consensus:".bold());
    let verdict = if report.consensus.approved {
        "approved".green()
    } else {
        "rejected".red()
    };
    println!(
        "  {} ({} voters, {:.0}% approval)",
        verdict,
        report.consensus.votes.len(),
        report.consensus.approval_rate * 100.0
    );
    println!();

    println!("{}", "Pattern Memory:".bold());
    println!("  Patterns: {}", report.memory.total_patterns);
    for (tier, count) in &report.memory.by_tier {
        println!("    {}: {}", tier, count);
    }
    println!("  Merged by dream cycle: {}", report.patterns_merged);
    println!("  Average confidence: {:.3}", report.memory.average_confidence);
    println!();

    println!("{}", "Event Bus:".bold());
    println!(
        "  Emitted: {}, delivered: {}, handler failures: {}",
        report.event_bus.emitted, report.event_bus.delivered, report.event_bus.handler_failures
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tasks: usize, failure_rate: f64) -> SimulateArgs {
        SimulateArgs {
            agents_per_domain: 1,
            tasks,
            failure_rate,
            max_latency_ms: 2,
            seed: Some(7),
            json: false,
        }
    }

    fn config() -> HiveConfig {
        let mut config = HiveConfig::default();
        config.spec.coordinator.tick_interval_ms = 5;
        config.spec.memory.dimensions = 32;
        config
    }

    #[tokio::test]
    async fn test_every_task_reaches_a_terminal_state() {
        let report = run_simulation(&config(), &args(20, 0.0)).await.unwrap();

        assert_eq!(report.completed, 20);
        assert_eq!(report.failed, 0);
        assert_eq!(report.abandoned, 0);
        assert_eq!(report.coordinator.tasks_submitted, 20);
        assert_eq!(report.coordinator.tasks_queued, 0);
        assert!(report.consensus.approved);
    }

    #[tokio::test]
    async fn test_failures_feed_back_into_memory() {
        let report = run_simulation(&config(), &args(10, 1.0)).await.unwrap();

        assert_eq!(report.failed, 10);
        // One seeded use per type plus every recorded outcome; merges keep usage.
        assert_eq!(report.memory.total_usage, routed_task_types().count() as u64 + 10);
        assert!(report.memory.average_confidence < 0.85);
        assert!(report.event_bus.emitted > 0);
    }

    #[tokio::test]
    async fn test_dream_cycle_folds_seeded_duplicates() {
        let report = run_simulation(&config(), &args(0, 0.0)).await.unwrap();
        let routed_types = routed_task_types().count();

        assert_eq!(report.patterns_merged, routed_types);
        assert_eq!(report.memory.total_patterns, routed_types);
    }
}
