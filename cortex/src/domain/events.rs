// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the pattern memory
//!
//! Published on the shared event bus when one is attached, under the
//! `pattern:*` and `memory:*` event types.

use chrono::{DateTime, Utc};
use hive_core::domain::events::Event;
use serde::{Deserialize, Serialize};

use super::pattern::{ConfidenceTier, PatternId};

pub const EVENT_SOURCE: &str = "memory";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CortexEvent {
    PatternStored {
        pattern_id: PatternId,
        pattern_type: String,
        tier: ConfidenceTier,
        source: String,
        timestamp: DateTime<Utc>,
    },

    PatternUpdated {
        pattern_id: PatternId,
        confidence: f64,
        usage_count: u64,
        success_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// Confidence moved the pattern across a tier threshold
    PatternTierChanged {
        pattern_id: PatternId,
        from: ConfidenceTier,
        to: ConfidenceTier,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    PatternDeleted {
        pattern_id: PatternId,
        timestamp: DateTime<Utc>,
    },

    /// One dream-cycle pass finished
    MemoryConsolidated {
        examined: usize,
        merged: usize,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },
}

impl CortexEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::PatternStored { .. } => "pattern:stored",
            CortexEvent::PatternUpdated { .. } => "pattern:updated",
            CortexEvent::PatternTierChanged { .. } => "pattern:tier-changed",
            CortexEvent::PatternDeleted { .. } => "pattern:deleted",
            CortexEvent::MemoryConsolidated { .. } => "memory:consolidated",
        }
    }

    pub fn into_event(self) -> Event {
        let event_type = self.event_type();
        let payload = serde_json::to_value(&self).unwrap_or_default();
        Event::new(event_type, payload, EVENT_SOURCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_is_flat() {
        let id = PatternId::new();
        let event = CortexEvent::PatternTierChanged {
            pattern_id: id,
            from: ConfidenceTier::Silver,
            to: ConfidenceTier::Gold,
            confidence: 0.86,
            timestamp: Utc::now(),
        }
        .into_event();

        assert_eq!(event.event_type, "pattern:tier-changed");
        assert_eq!(event.source, EVENT_SOURCE);
        assert_eq!(event.payload["from"], "silver");
        assert_eq!(event.payload["to"], "gold");
        assert_eq!(event.payload["pattern_id"], serde_json::json!(id));
    }
}
