// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use hive_core::domain::node_config::TierThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64, thresholds: &TierThresholds) -> Self {
        if confidence >= thresholds.platinum {
            ConfidenceTier::Platinum
        } else if confidence >= thresholds.gold {
            ConfidenceTier::Gold
        } else if confidence >= thresholds.silver {
            ConfidenceTier::Silver
        } else {
            ConfidenceTier::Bronze
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Bronze => "bronze",
            ConfidenceTier::Silver => "silver",
            ConfidenceTier::Gold => "gold",
            ConfidenceTier::Platinum => "platinum",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A reusable behaviour learned from task outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub pattern_type: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub embedding: Vec<f32>,
    confidence: f64,
    tier: ConfidenceTier,
    pub source: String,
    pub usage_count: u64,
    pub success_rate: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Pattern {
    pub fn from_draft(draft: PatternDraft, thresholds: &TierThresholds) -> Self {
        let confidence = draft.confidence.clamp(0.0, 1.0);
        Self {
            id: PatternId::new(),
            pattern_type: draft.pattern_type,
            content: draft.content,
            embedding: draft.embedding,
            confidence,
            tier: ConfidenceTier::from_confidence(confidence, thresholds),
            source: draft.source,
            usage_count: draft.usage_count,
            success_rate: draft.success_rate.clamp(0.0, 1.0),
            metadata: draft.metadata,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn tier(&self) -> ConfidenceTier {
        self.tier
    }

    /// Set confidence (clamped to `[0, 1]`) and recompute the tier.
    /// Returns the previous tier when it changed.
    pub fn set_confidence(&mut self, confidence: f64, thresholds: &TierThresholds) -> Option<ConfidenceTier> {
        self.confidence = confidence.clamp(0.0, 1.0);
        let previous = self.tier;
        self.tier = ConfidenceTier::from_confidence(self.confidence, thresholds);
        (previous != self.tier).then_some(previous)
    }

    /// Recompute the tier against new thresholds.
    pub fn retier(&mut self, thresholds: &TierThresholds) -> Option<ConfidenceTier> {
        self.set_confidence(self.confidence, thresholds)
    }

    /// Fold one outcome into usage and success rate, then move confidence
    /// toward 1 (success) or 0 (failure) by `learning_rate` of the remaining
    /// distance. Returns the previous tier when it changed.
    pub fn record_outcome(
        &mut self,
        success: bool,
        learning_rate: f64,
        thresholds: &TierThresholds,
    ) -> Option<ConfidenceTier> {
        self.usage_count += 1;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate += (outcome - self.success_rate) / self.usage_count as f64;
        self.last_used_at = Some(Utc::now());

        let confidence = if success {
            self.confidence + learning_rate * (1.0 - self.confidence)
        } else {
            self.confidence - learning_rate * self.confidence
        };
        self.set_confidence(confidence, thresholds)
    }

    /// Fold `other`'s usage into this pattern: usage counts add up and the
    /// success rate becomes the usage-weighted mean.
    pub fn absorb(&mut self, other: &Pattern) {
        let total = self.usage_count + other.usage_count;
        if total > 0 {
            self.success_rate = (self.success_rate * self.usage_count as f64
                + other.success_rate * other.usage_count as f64)
                / total as f64;
        }
        self.usage_count = total;
        self.last_used_at = self.last_used_at.max(other.last_used_at);
    }
}

fn default_confidence() -> f64 {
    0.5
}

/// Input for storing a new pattern. Also the payload of `pattern:share`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDraft {
    pub pattern_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PatternDraft {
    pub fn new(pattern_type: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            content,
            embedding: Vec::new(),
            confidence: default_confidence(),
            source: String::new(),
            usage_count: 0,
            success_rate: 0.0,
            metadata: Metadata::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_usage(mut self, usage_count: u64, success_rate: f64) -> Self {
        self.usage_count = usage_count;
        self.success_rate = success_rate;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternUpdate {
    pub pattern_type: Option<String>,
    pub content: Option<serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub confidence: Option<f64>,
    pub source: Option<String>,
    /// Merged key by key into the existing metadata.
    pub metadata: Option<Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thresholds() -> TierThresholds {
        TierThresholds::default()
    }

    #[test]
    fn test_tier_boundaries() {
        let t = thresholds();
        assert_eq!(ConfidenceTier::from_confidence(0.0, &t), ConfidenceTier::Bronze);
        assert_eq!(ConfidenceTier::from_confidence(0.69, &t), ConfidenceTier::Bronze);
        assert_eq!(ConfidenceTier::from_confidence(0.7, &t), ConfidenceTier::Silver);
        assert_eq!(ConfidenceTier::from_confidence(0.85, &t), ConfidenceTier::Gold);
        assert_eq!(ConfidenceTier::from_confidence(0.95, &t), ConfidenceTier::Platinum);
        assert_eq!(ConfidenceTier::from_confidence(1.0, &t), ConfidenceTier::Platinum);
    }

    #[test]
    fn test_confidence_stays_in_unit_interval() {
        let t = thresholds();
        let mut pattern = Pattern::from_draft(PatternDraft::new("fix", json!({})), &t);

        for _ in 0..500 {
            let before = pattern.confidence();
            pattern.record_outcome(true, 0.3, &t);
            assert!(pattern.confidence() >= before);
            assert!(pattern.confidence() <= 1.0);
        }
        for _ in 0..500 {
            let before = pattern.confidence();
            pattern.record_outcome(false, 0.3, &t);
            assert!(pattern.confidence() <= before);
            assert!(pattern.confidence() >= 0.0);
        }
        assert_eq!(pattern.tier(), ConfidenceTier::Bronze);
    }

    #[test]
    fn test_running_success_rate() {
        let t = thresholds();
        let mut pattern = Pattern::from_draft(PatternDraft::new("fix", json!({})), &t);
        pattern.record_outcome(true, 0.1, &t);
        pattern.record_outcome(false, 0.1, &t);
        pattern.record_outcome(true, 0.1, &t);
        pattern.record_outcome(true, 0.1, &t);

        assert_eq!(pattern.usage_count, 4);
        assert!((pattern.success_rate - 0.75).abs() < 1e-9);
        assert!(pattern.last_used_at.is_some());
    }

    #[test]
    fn test_absorb_weights_success_rate() {
        let t = thresholds();
        let mut survivor = Pattern::from_draft(PatternDraft::new("fix", json!({})).with_usage(6, 1.0), &t);
        let duplicate = Pattern::from_draft(PatternDraft::new("fix", json!({})).with_usage(2, 0.5), &t);

        survivor.absorb(&duplicate);
        assert_eq!(survivor.usage_count, 8);
        assert!((survivor.success_rate - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_set_confidence_reports_tier_change() {
        let t = thresholds();
        let mut pattern = Pattern::from_draft(PatternDraft::new("fix", json!({})), &t);
        assert_eq!(pattern.set_confidence(0.6, &t), None);
        assert_eq!(pattern.set_confidence(0.9, &t), Some(ConfidenceTier::Bronze));
        assert_eq!(pattern.tier(), ConfidenceTier::Gold);
        assert_eq!(pattern.set_confidence(7.0, &t), Some(ConfidenceTier::Gold));
        assert_eq!(pattern.confidence(), 1.0);
    }

    #[test]
    fn test_draft_deserialises_with_defaults() {
        let draft: PatternDraft = serde_json::from_value(json!({
            "pattern_type": "review-checklist",
            "content": {"steps": 3}
        }))
        .unwrap();
        assert_eq!(draft.confidence, 0.5);
        assert!(draft.embedding.is_empty());
        assert_eq!(draft.usage_count, 0);
    }
}
