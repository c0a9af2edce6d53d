// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the pattern memory: reinforcement, the dream cycle,
//! text search and event-bus integration.

use hive_core::domain::events::{Event, EventFilter};
use hive_core::domain::node_config::{IndexConfig, MemoryConfig};
use hive_core::infrastructure::event_bus::EventBus;
use hive_cortex::{
    ConfidenceTier, HashingEmbedding, MemoryQuery, MemoryService, PatternDraft, StandardMemoryService,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config(dimensions: usize) -> MemoryConfig {
    MemoryConfig {
        dimensions,
        index: IndexConfig {
            seed: Some(99),
            ..IndexConfig::default()
        },
        ..MemoryConfig::default()
    }
}

#[tokio::test]
async fn test_repeated_success_promotes_confidence() {
    let memory = StandardMemoryService::new(MemoryConfig {
        learning_rate: 0.25,
        ..config(4)
    });
    let id = memory
        .store_pattern(PatternDraft::new("retry-policy", json!({"attempts": 3})))
        .await
        .unwrap();

    let mut previous = memory.get_pattern(id).await.unwrap();
    assert_eq!(previous.tier(), ConfidenceTier::Bronze);

    for _ in 0..3 {
        let next = memory.record_success(id).await.unwrap();
        assert!(next.confidence() > previous.confidence());
        assert!(next.tier() >= previous.tier());
        previous = next;
    }

    // 0.5 -> 0.625 -> 0.71875 -> 0.7890625
    assert!((previous.confidence() - 0.7890625).abs() < 1e-9);
    assert_eq!(previous.tier(), ConfidenceTier::Silver);
    assert_eq!(previous.usage_count, 3);
    assert!((previous.success_rate - 1.0).abs() < 1e-9);

    let demoted = memory.record_failure(id).await.unwrap();
    assert!(demoted.confidence() < previous.confidence());
    assert!((demoted.success_rate - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn test_dream_cycle_merges_low_confidence_duplicate() {
    let bus = EventBus::new(100);
    let memory = StandardMemoryService::new(config(4)).with_event_bus(bus.clone());
    let platinum = memory
        .store_pattern(
            PatternDraft::new("fix", json!("use a bounded channel"))
                .with_embedding(vec![1.0, 0.0, 0.0, 0.0])
                .with_confidence(0.96)
                .with_usage(10, 0.9),
        )
        .await
        .unwrap();
    let bronze = memory
        .store_pattern(
            PatternDraft::new("fix", json!("use bounded channels"))
                .with_embedding(vec![0.99, 0.01, 0.0, 0.0])
                .with_confidence(0.30)
                .with_usage(4, 0.25),
        )
        .await
        .unwrap();
    let unrelated = memory
        .store_pattern(
            PatternDraft::new("fix", json!("pin the toolchain"))
                .with_embedding(vec![0.0, 0.0, 1.0, 0.0])
                .with_confidence(0.2),
        )
        .await
        .unwrap();

    let before = memory.get_stats().await.total_patterns;
    let merged = memory.consolidate_patterns().await.unwrap();

    assert_eq!(merged, 1);
    assert!(memory.get_pattern(bronze).await.is_none());
    assert!(memory.get_pattern(unrelated).await.is_some());
    let survivor = memory.get_pattern(platinum).await.unwrap();
    assert_eq!(survivor.usage_count, 14);
    assert!((survivor.success_rate - (10.0 * 0.9 + 4.0 * 0.25) / 14.0).abs() < 1e-9);
    assert_eq!(survivor.tier(), ConfidenceTier::Platinum);

    let stats = memory.get_stats().await;
    assert!(stats.total_patterns <= before);
    assert_eq!(stats.total_patterns, 2);
    assert_eq!(stats.patterns_merged, 1);

    // The survivor's merged statistics are announced like any other update.
    let consolidation: Vec<Event> = bus
        .get_history(&EventFilter::default().with_source("memory"))
        .unwrap()
        .into_iter()
        .skip(3)
        .collect();
    let types: Vec<&str> = consolidation.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["pattern:deleted", "pattern:updated", "memory:consolidated"]);
    assert_eq!(consolidation[0].payload["pattern_id"], json!(bronze));
    assert_eq!(consolidation[1].payload["pattern_id"], json!(platinum));
    assert_eq!(consolidation[1].payload["usage_count"], json!(14));

    // A second pass has nothing left to merge.
    assert_eq!(memory.consolidate_patterns().await.unwrap(), 0);
}

#[tokio::test]
async fn test_semantic_search_uses_hashing_embedding() {
    let embedder = HashingEmbedding::new(64);
    let memory = StandardMemoryService::new(config(64));

    for (text, kind) in [
        ("retry failed network requests with backoff", "resilience"),
        ("cache compiled regex patterns", "performance"),
        ("validate user input before parsing", "security"),
    ] {
        memory
            .store_pattern(PatternDraft::new(kind, json!(text)).with_embedding(embedder.embed_sync(text)))
            .await
            .unwrap();
    }

    let hits = memory
        .semantic_search("retry failed network requests with backoff", 1)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].pattern.pattern_type, "resilience");
    assert!(hits[0].similarity > 0.99);

    let typed = memory
        .search(MemoryQuery::by_text("regex").of_type("security").with_limit(5))
        .await
        .unwrap();
    assert!(typed.iter().all(|r| r.pattern.pattern_type == "security"));
}

#[tokio::test]
async fn test_events_and_shared_pattern_import() {
    let bus = EventBus::new(100);
    let memory = Arc::new(StandardMemoryService::new(config(2)).with_event_bus(bus.clone()));
    memory.subscribe_to_shared_patterns(&bus).unwrap();

    bus.emit(Event::new(
        "pattern:share",
        json!({
            "pattern_type": "review-checklist",
            "content": {"items": 4},
            "embedding": [0.5, 0.5],
            "confidence": 0.945
        }),
        "quality",
    ))
    .await;

    let stored = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let found = memory.search(MemoryQuery::default().of_type("review-checklist")).await.unwrap();
            if let Some(hit) = found.into_iter().next() {
                return hit.pattern;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(stored.source, "quality");
    assert_eq!(stored.tier(), ConfidenceTier::Gold);

    memory.record_success(stored.id).await.unwrap();
    memory.delete_pattern(stored.id).await;

    let types: Vec<String> = bus
        .get_history(&EventFilter::default().with_source("memory"))
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        types,
        vec!["pattern:stored", "pattern:updated", "pattern:tier-changed", "pattern:deleted"]
    );
}
