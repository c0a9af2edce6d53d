// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Consolidation scheduler - background dream cycle
//!
//! Periodically asks the memory to fold low-confidence near-duplicates into
//! their trusted counterparts. Each pass is bounded by the memory's
//! consolidation batch size.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drive `MemoryService::consolidate_patterns` on an interval

use std::sync::Arc;
use std::time::Duration;

use hive_core::domain::node_config::ConsolidationConfig;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::memory_service::MemoryService;

pub struct ConsolidationScheduler {
    memory: Arc<dyn MemoryService>,
    config: ConsolidationConfig,
    shutdown_token: CancellationToken,
}

impl ConsolidationScheduler {
    pub fn new(memory: Arc<dyn MemoryService>, config: ConsolidationConfig) -> Self {
        Self {
            memory,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Memory consolidation is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            similarity_threshold = self.config.similarity_threshold,
            batch_size = self.config.batch_size,
            "Starting memory consolidation task"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running memory consolidation cycle");
                    match self.memory.consolidate_patterns().await {
                        Ok(merged) => debug!(merged, "Memory consolidation cycle completed"),
                        Err(e) => warn!("Memory consolidation cycle failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping memory consolidation");
                    break;
                }
            }
        }

        info!("Memory consolidation task stopped");
    }
}
