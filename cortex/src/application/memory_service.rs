// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Unified pattern memory
//!
//! Patterns live in a map keyed by id, with a secondary index by type and an
//! [`HnswIndex`] over their embeddings. Patterns with an empty embedding are
//! stored but never indexed, so they only surface through metadata queries.
//!
//! Ranking blends confidence, success rate, capped usage and similarity
//! using [`RankingWeights`](hive_core::domain::node_config::RankingWeights).
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Store, search, reinforce and consolidate patterns
//! - **Concurrency:** one `RwLock` guards patterns and index together, so
//!   updates to a single pattern are serialised

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hive_core::domain::events::Event;
use hive_core::domain::node_config::MemoryConfig;
use hive_core::infrastructure::event_bus::{handler, EventBus, EventBusError, SubscriptionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{ConfidenceTier, CortexEvent, MemoryError, Pattern, PatternDraft, PatternId, PatternUpdate};
use crate::infrastructure::embedding::{EmbeddingProvider, HashingEmbedding};
use crate::infrastructure::hnsw::{HnswIndex, IndexError};

/// Neighbours inspected per consolidation candidate.
const CONSOLIDATION_NEIGHBORS: usize = 8;

/// Incoming event type carrying a [`PatternDraft`] from another domain.
pub const SHARE_EVENT: &str = "pattern:share";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Nearest-neighbour query vector. Takes precedence over `text`.
    pub vector: Option<Vec<f32>>,
    /// Free text, embedded with the configured provider.
    pub text: Option<String>,
    pub pattern_type: Option<String>,
    pub min_confidence: Option<f64>,
    pub limit: usize,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            vector: None,
            text: None,
            pattern_type: None,
            min_confidence: None,
            limit: 10,
        }
    }
}

impl MemoryQuery {
    pub fn by_vector(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            ..Self::default()
        }
    }

    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn of_type(mut self, pattern_type: impl Into<String>) -> Self {
        self.pattern_type = Some(pattern_type.into());
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub pattern: Pattern,
    /// `1 / (1 + distance)`; zero for metadata-only queries.
    pub similarity: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub total_patterns: usize,
    pub indexed_patterns: usize,
    pub by_tier: BTreeMap<ConfidenceTier, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub average_success_rate: f64,
    pub total_usage: u64,
    pub consolidation_runs: u64,
    pub patterns_merged: u64,
}

#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn store_pattern(&self, draft: PatternDraft) -> Result<PatternId, MemoryError>;

    async fn get_pattern(&self, id: PatternId) -> Option<Pattern>;

    async fn update_pattern(&self, id: PatternId, update: PatternUpdate) -> Result<Pattern, MemoryError>;

    async fn delete_pattern(&self, id: PatternId) -> bool;

    async fn search(&self, query: MemoryQuery) -> Result<Vec<SearchResult>, MemoryError>;

    async fn semantic_search(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>, MemoryError>;

    async fn record_success(&self, id: PatternId) -> Result<Pattern, MemoryError>;

    async fn record_failure(&self, id: PatternId) -> Result<Pattern, MemoryError>;

    /// Run one dream-cycle pass. Returns the number of patterns merged away.
    async fn consolidate_patterns(&self) -> Result<usize, MemoryError>;

    async fn get_stats(&self) -> MemoryStats;

    /// Snapshot of every pattern, oldest first.
    async fn export_patterns(&self) -> Vec<Pattern>;

    /// Restore patterns (replacing any with the same id). Nothing is
    /// imported if any embedding has the wrong dimension.
    async fn import_patterns(&self, patterns: Vec<Pattern>) -> Result<usize, MemoryError>;
}

struct MemoryState {
    patterns: HashMap<PatternId, Pattern>,
    by_type: HashMap<String, HashSet<PatternId>>,
    index: HnswIndex<PatternId>,
}

impl MemoryState {
    fn insert(&mut self, pattern: Pattern) -> Result<(), IndexError> {
        if !pattern.embedding.is_empty() {
            self.index.insert(pattern.id, pattern.embedding.clone())?;
        }
        self.by_type
            .entry(pattern.pattern_type.clone())
            .or_default()
            .insert(pattern.id);
        self.patterns.insert(pattern.id, pattern);
        Ok(())
    }

    fn remove(&mut self, id: PatternId) -> Option<Pattern> {
        let pattern = self.patterns.remove(&id)?;
        self.index.remove(&id);
        if let Some(ids) = self.by_type.get_mut(&pattern.pattern_type) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_type.remove(&pattern.pattern_type);
            }
        }
        Some(pattern)
    }
}

pub struct StandardMemoryService {
    config: MemoryConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    event_bus: Option<EventBus>,
    state: RwLock<MemoryState>,
    consolidation_runs: AtomicU64,
    patterns_merged: AtomicU64,
}

impl StandardMemoryService {
    /// Memory with the hashing fallback embedding.
    pub fn new(config: MemoryConfig) -> Self {
        let embedder = Arc::new(HashingEmbedding::new(config.dimensions));
        Self::with_embedder(config, embedder)
    }

    pub fn with_embedder(config: MemoryConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        if embedder.dimensions() != config.dimensions {
            warn!(
                embedder = embedder.dimensions(),
                index = config.dimensions,
                "Embedding provider dimension differs from index dimension; text queries will fail"
            );
        }
        let index = HnswIndex::new(config.dimensions, &config.index);
        Self {
            config,
            embedder,
            event_bus: None,
            state: RwLock::new(MemoryState {
                patterns: HashMap::new(),
                by_type: HashMap::new(),
                index,
            }),
            consolidation_runs: AtomicU64::new(0),
            patterns_merged: AtomicU64::new(0),
        }
    }

    /// Publish pattern and consolidation events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// Store every `pattern:share` draft published on `bus`.
    pub fn subscribe_to_shared_patterns(self: &Arc<Self>, bus: &EventBus) -> Result<SubscriptionId, EventBusError> {
        let memory = Arc::downgrade(self);
        bus.on(
            SHARE_EVENT,
            handler(move |event: Event| {
                let memory = memory.clone();
                async move {
                    let Some(memory) = memory.upgrade() else {
                        return Ok(());
                    };
                    let mut draft: PatternDraft = serde_json::from_value(event.payload)?;
                    if draft.source.is_empty() {
                        draft.source = event.source;
                    }
                    let id = memory.store_pattern(draft).await?;
                    debug!(pattern_id = %id, "Imported shared pattern");
                    Ok(())
                }
            }),
        )
    }

    async fn publish(&self, events: Vec<CortexEvent>) {
        let Some(bus) = &self.event_bus else {
            return;
        };
        for event in events {
            bus.emit(event.into_event()).await;
        }
    }

    fn relevance(&self, pattern: &Pattern, similarity: f64) -> f64 {
        let weights = &self.config.ranking;
        let usage = if weights.usage_cap == 0 {
            0.0
        } else {
            pattern.usage_count.min(weights.usage_cap) as f64 / weights.usage_cap as f64
        };
        weights.confidence * pattern.confidence()
            + weights.success_rate * pattern.success_rate
            + weights.usage * usage
            + weights.similarity * similarity
    }

    async fn record_outcome(&self, id: PatternId, success: bool) -> Result<Pattern, MemoryError> {
        let (pattern, previous_tier) = {
            let mut state = self.state.write();
            let pattern = state.patterns.get_mut(&id).ok_or(MemoryError::PatternNotFound(id))?;
            let previous_tier = pattern.record_outcome(success, self.config.learning_rate, &self.config.tiers);
            (pattern.clone(), previous_tier)
        };

        debug!(
            pattern_id = %id,
            success,
            confidence = pattern.confidence(),
            tier = %pattern.tier(),
            "Recorded pattern outcome"
        );
        self.publish(change_events(&pattern, previous_tier)).await;
        Ok(pattern)
    }
}

fn change_events(pattern: &Pattern, previous_tier: Option<ConfidenceTier>) -> Vec<CortexEvent> {
    let now = Utc::now();
    let mut events = vec![CortexEvent::PatternUpdated {
        pattern_id: pattern.id,
        confidence: pattern.confidence(),
        usage_count: pattern.usage_count,
        success_rate: pattern.success_rate,
        timestamp: now,
    }];
    if let Some(from) = previous_tier {
        events.push(CortexEvent::PatternTierChanged {
            pattern_id: pattern.id,
            from,
            to: pattern.tier(),
            confidence: pattern.confidence(),
            timestamp: now,
        });
    }
    events
}

fn validate_confidence(confidence: f64) -> Result<(), MemoryError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(MemoryError::InvalidConfidence(confidence))
    }
}

#[async_trait]
impl MemoryService for StandardMemoryService {
    async fn store_pattern(&self, draft: PatternDraft) -> Result<PatternId, MemoryError> {
        validate_confidence(draft.confidence)?;
        let pattern = Pattern::from_draft(draft, &self.config.tiers);
        let event = CortexEvent::PatternStored {
            pattern_id: pattern.id,
            pattern_type: pattern.pattern_type.clone(),
            tier: pattern.tier(),
            source: pattern.source.clone(),
            timestamp: pattern.created_at,
        };
        let id = pattern.id;

        self.state.write().insert(pattern)?;

        metrics::counter!("hive_patterns_stored_total").increment(1);
        debug!(pattern_id = %id, "Stored pattern");
        self.publish(vec![event]).await;
        Ok(id)
    }

    async fn get_pattern(&self, id: PatternId) -> Option<Pattern> {
        self.state.read().patterns.get(&id).cloned()
    }

    async fn update_pattern(&self, id: PatternId, update: PatternUpdate) -> Result<Pattern, MemoryError> {
        if let Some(confidence) = update.confidence {
            validate_confidence(confidence)?;
        }

        let (pattern, previous_tier) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            if !state.patterns.contains_key(&id) {
                return Err(MemoryError::PatternNotFound(id));
            }

            // Index first so a bad embedding leaves the pattern untouched.
            if let Some(embedding) = &update.embedding {
                if embedding.is_empty() {
                    state.index.remove(&id);
                } else {
                    state.index.insert(id, embedding.clone())?;
                }
            }

            let pattern = state.patterns.get_mut(&id).ok_or(MemoryError::PatternNotFound(id))?;
            if let Some(pattern_type) = update.pattern_type {
                if pattern_type != pattern.pattern_type {
                    if let Some(ids) = state.by_type.get_mut(&pattern.pattern_type) {
                        ids.remove(&id);
                    }
                    state.by_type.retain(|_, ids| !ids.is_empty());
                    state.by_type.entry(pattern_type.clone()).or_default().insert(id);
                    pattern.pattern_type = pattern_type;
                }
            }
            if let Some(content) = update.content {
                pattern.content = content;
            }
            if let Some(embedding) = update.embedding {
                pattern.embedding = embedding;
            }
            if let Some(source) = update.source {
                pattern.source = source;
            }
            if let Some(metadata) = update.metadata {
                pattern.metadata.extend(metadata);
            }
            let previous_tier = match update.confidence {
                Some(confidence) => pattern.set_confidence(confidence, &self.config.tiers),
                None => None,
            };
            (pattern.clone(), previous_tier)
        };

        self.publish(change_events(&pattern, previous_tier)).await;
        Ok(pattern)
    }

    async fn delete_pattern(&self, id: PatternId) -> bool {
        let removed = self.state.write().remove(id).is_some();
        if removed {
            debug!(pattern_id = %id, "Deleted pattern");
            self.publish(vec![CortexEvent::PatternDeleted {
                pattern_id: id,
                timestamp: Utc::now(),
            }])
            .await;
        }
        removed
    }

    async fn search(&self, query: MemoryQuery) -> Result<Vec<SearchResult>, MemoryError> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let vector = match (query.vector, &query.text) {
            (Some(vector), _) => Some(vector),
            (None, Some(text)) => Some(self.embedder.embed(text).await.map_err(MemoryError::Embedding)?),
            (None, None) => None,
        };

        let state = self.state.read();
        let candidates: Vec<(&Pattern, f64)> = match &vector {
            Some(vector) => {
                let pool = (query.limit * 4).max(self.config.index.ef_search);
                state
                    .index
                    .search(vector, pool)?
                    .into_iter()
                    .filter_map(|hit| state.patterns.get(&hit.key).map(|p| (p, hit.similarity as f64)))
                    .collect()
            }
            None => match &query.pattern_type {
                Some(pattern_type) => state
                    .by_type
                    .get(pattern_type)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| state.patterns.get(id).map(|p| (p, 0.0)))
                    .collect(),
                None => state.patterns.values().map(|p| (p, 0.0)).collect(),
            },
        };

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|(p, _)| query.pattern_type.as_ref().is_none_or(|t| &p.pattern_type == t))
            .filter(|(p, _)| query.min_confidence.is_none_or(|min| p.confidence() >= min))
            .map(|(p, similarity)| SearchResult {
                score: self.relevance(p, similarity),
                pattern: p.clone(),
                similarity,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.similarity.total_cmp(&a.similarity))
                .then(a.pattern.created_at.cmp(&b.pattern.created_at))
        });
        results.truncate(query.limit);
        Ok(results)
    }

    async fn semantic_search(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>, MemoryError> {
        self.search(MemoryQuery::by_text(text).with_limit(limit)).await
    }

    async fn record_success(&self, id: PatternId) -> Result<Pattern, MemoryError> {
        self.record_outcome(id, true).await
    }

    async fn record_failure(&self, id: PatternId) -> Result<Pattern, MemoryError> {
        self.record_outcome(id, false).await
    }

    async fn consolidate_patterns(&self) -> Result<usize, MemoryError> {
        let gold = self.config.tiers.gold;
        let threshold = self.config.consolidation.similarity_threshold;

        let (examined, merges, survivors, remaining) = {
            let mut guard = self.state.write();
            let state = &mut *guard;

            let mut candidates: Vec<&Pattern> = state
                .patterns
                .values()
                .filter(|p| p.confidence() < gold && state.index.contains(&p.id))
                .collect();
            candidates.sort_by(|a, b| {
                a.confidence()
                    .total_cmp(&b.confidence())
                    .then(a.created_at.cmp(&b.created_at))
            });
            let candidates: Vec<PatternId> = candidates
                .into_iter()
                .take(self.config.consolidation.batch_size)
                .map(|p| p.id)
                .collect();

            let mut merges = Vec::new();
            let mut survivors: Vec<PatternId> = Vec::new();
            for id in &candidates {
                let Some(vector) = state.index.get(id).map(<[f32]>::to_vec) else {
                    continue;
                };
                let survivor = state
                    .index
                    .search(&vector, CONSOLIDATION_NEIGHBORS)?
                    .into_iter()
                    .filter(|hit| hit.key != *id && f64::from(hit.similarity) > threshold)
                    .find(|hit| state.patterns.get(&hit.key).is_some_and(|p| p.confidence() >= gold))
                    .map(|hit| hit.key);
                let Some(survivor) = survivor else {
                    continue;
                };

                let Some(duplicate) = state.remove(*id) else {
                    continue;
                };
                if let Some(target) = state.patterns.get_mut(&survivor) {
                    target.absorb(&duplicate);
                }
                debug!(duplicate = %id, survivor = %survivor, "Merged near-duplicate pattern");
                merges.push(*id);
                if !survivors.contains(&survivor) {
                    survivors.push(survivor);
                }
            }
            let survivors: Vec<Pattern> = survivors
                .iter()
                .filter_map(|id| state.patterns.get(id).cloned())
                .collect();
            (candidates.len(), merges, survivors, state.patterns.len())
        };

        let merged = merges.len();
        self.consolidation_runs.fetch_add(1, Ordering::Relaxed);
        self.patterns_merged.fetch_add(merged as u64, Ordering::Relaxed);
        metrics::counter!("hive_patterns_consolidated_total").increment(merged as u64);
        info!(examined, merged, remaining, "Memory consolidation pass finished");

        let now = Utc::now();
        let mut events: Vec<CortexEvent> = merges
            .into_iter()
            .map(|pattern_id| CortexEvent::PatternDeleted { pattern_id, timestamp: now })
            .collect();
        events.extend(survivors.iter().flat_map(|survivor| change_events(survivor, None)));
        events.push(CortexEvent::MemoryConsolidated {
            examined,
            merged,
            remaining,
            timestamp: now,
        });
        self.publish(events).await;
        Ok(merged)
    }

    async fn get_stats(&self) -> MemoryStats {
        let state = self.state.read();
        let total = state.patterns.len();
        let mut stats = MemoryStats {
            total_patterns: total,
            indexed_patterns: state.index.len(),
            consolidation_runs: self.consolidation_runs.load(Ordering::Relaxed),
            patterns_merged: self.patterns_merged.load(Ordering::Relaxed),
            ..MemoryStats::default()
        };
        for pattern in state.patterns.values() {
            *stats.by_tier.entry(pattern.tier()).or_default() += 1;
            *stats.by_type.entry(pattern.pattern_type.clone()).or_default() += 1;
            stats.average_confidence += pattern.confidence();
            stats.average_success_rate += pattern.success_rate;
            stats.total_usage += pattern.usage_count;
        }
        if total > 0 {
            stats.average_confidence /= total as f64;
            stats.average_success_rate /= total as f64;
        }
        stats
    }

    async fn export_patterns(&self) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = self.state.read().patterns.values().cloned().collect();
        patterns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        patterns
    }

    async fn import_patterns(&self, patterns: Vec<Pattern>) -> Result<usize, MemoryError> {
        let dimensions = self.config.dimensions;
        if let Some(bad) = patterns
            .iter()
            .find(|p| !p.embedding.is_empty() && p.embedding.len() != dimensions)
        {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.embedding.len(),
            }
            .into());
        }

        let count = patterns.len();
        {
            let mut state = self.state.write();
            for mut pattern in patterns {
                pattern.retier(&self.config.tiers);
                state.remove(pattern.id);
                state.insert(pattern)?;
            }
        }
        info!(count, "Imported patterns");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::domain::node_config::IndexConfig;
    use serde_json::json;

    fn memory(dimensions: usize) -> StandardMemoryService {
        StandardMemoryService::new(MemoryConfig {
            dimensions,
            index: IndexConfig {
                seed: Some(17),
                ..IndexConfig::default()
            },
            ..MemoryConfig::default()
        })
    }

    #[tokio::test]
    async fn test_store_get_delete() {
        let memory = memory(4);
        let id = memory
            .store_pattern(PatternDraft::new("fix", json!({"diff": "+1"})).with_embedding(vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();

        let pattern = memory.get_pattern(id).await.unwrap();
        assert_eq!(pattern.tier(), ConfidenceTier::Bronze);
        assert_eq!(memory.get_stats().await.indexed_patterns, 1);

        assert!(memory.delete_pattern(id).await);
        assert!(!memory.delete_pattern(id).await);
        assert!(memory.get_pattern(id).await.is_none());
        assert_eq!(memory.get_stats().await.indexed_patterns, 0);
    }

    #[tokio::test]
    async fn test_empty_embedding_is_stored_but_not_indexed() {
        let memory = memory(4);
        memory
            .store_pattern(PatternDraft::new("note", json!("remember")))
            .await
            .unwrap();

        let stats = memory.get_stats().await;
        assert_eq!(stats.total_patterns, 1);
        assert_eq!(stats.indexed_patterns, 0);
        assert_eq!(memory.search(MemoryQuery::default().of_type("note")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_rejected() {
        let memory = memory(4);
        assert!(matches!(
            memory
                .store_pattern(PatternDraft::new("fix", json!({})).with_embedding(vec![1.0, 2.0]))
                .await,
            Err(MemoryError::Index(IndexError::DimensionMismatch { expected: 4, actual: 2 }))
        ));
        assert!(matches!(
            memory.store_pattern(PatternDraft::new("fix", json!({})).with_confidence(1.5)).await,
            Err(MemoryError::InvalidConfidence(_))
        ));
        assert!(matches!(
            memory.record_success(PatternId::new()).await,
            Err(MemoryError::PatternNotFound(_))
        ));
        assert_eq!(memory.get_stats().await.total_patterns, 0);
    }

    #[tokio::test]
    async fn test_update_moves_type_and_tier() {
        let memory = memory(2);
        let id = memory
            .store_pattern(PatternDraft::new("draft", json!({})).with_embedding(vec![0.0, 1.0]))
            .await
            .unwrap();

        let updated = memory
            .update_pattern(
                id,
                PatternUpdate {
                    pattern_type: Some("final".into()),
                    confidence: Some(0.9),
                    embedding: Some(vec![1.0, 0.0]),
                    ..PatternUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.tier(), ConfidenceTier::Gold);
        let stats = memory.get_stats().await;
        assert_eq!(stats.by_type.get("final"), Some(&1));
        assert!(!stats.by_type.contains_key("draft"));

        let hits = memory.search(MemoryQuery::by_vector(vec![1.0, 0.0]).with_limit(1)).await.unwrap();
        assert_eq!(hits[0].pattern.id, id);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ranking_blends_confidence_and_similarity() {
        let memory = memory(2);
        let trusted = memory
            .store_pattern(
                PatternDraft::new("fix", json!("trusted"))
                    .with_embedding(vec![0.0, 0.5])
                    .with_confidence(0.99)
                    .with_usage(100, 1.0),
            )
            .await
            .unwrap();
        memory
            .store_pattern(
                PatternDraft::new("fix", json!("exact"))
                    .with_embedding(vec![0.0, 0.0])
                    .with_confidence(0.1),
            )
            .await
            .unwrap();

        let hits = memory.search(MemoryQuery::by_vector(vec![0.0, 0.0])).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].pattern.id, trusted);
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].similarity > hits[0].similarity);

        let filtered = memory
            .search(MemoryQuery::by_vector(vec![0.0, 0.0]).with_min_confidence(0.5))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_export_import_round_trip_keeps_ids() {
        let source = memory(3);
        let id = source
            .store_pattern(
                PatternDraft::new("fix", json!({"n": 1}))
                    .with_embedding(vec![1.0, 1.0, 0.0])
                    .with_metadata("origin", json!("ci")),
            )
            .await
            .unwrap();
        let snapshot = source.export_patterns().await;

        let target = memory(3);
        assert_eq!(target.import_patterns(snapshot.clone()).await.unwrap(), 1);
        let restored = target.get_pattern(id).await.unwrap();
        assert_eq!(restored.metadata["origin"], "ci");
        assert_eq!(target.get_stats().await.indexed_patterns, 1);

        let wrong = memory(5);
        assert!(wrong.import_patterns(snapshot).await.is_err());
        assert_eq!(wrong.get_stats().await.total_patterns, 0);
    }
}
