// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cross-domain event vocabulary.
//!
//! An [`Event`] is immutable once emitted. Subscriptions and history filters
//! select events by an [`EventPattern`]: either an exact type such as
//! `task:completed`, or a wildcard such as `task:*` where every `*` matches any
//! run of characters and the whole type must match.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single published notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            payload,
            source: source.into(),
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Compiled subscription pattern.
#[derive(Debug, Clone)]
pub enum EventPattern {
    Exact(String),
    Wildcard { source: String, regex: Regex },
}

impl EventPattern {
    /// Compile a pattern string. Strings without `*` match exactly.
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        if !pattern.contains('*') {
            return Ok(EventPattern::Exact(pattern.to_string()));
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", body))?;

        Ok(EventPattern::Wildcard {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            EventPattern::Exact(expected) => expected == event_type,
            EventPattern::Wildcard { regex, .. } => regex.is_match(event_type),
        }
    }

    /// The pattern text as originally supplied.
    pub fn as_str(&self) -> &str {
        match self {
            EventPattern::Exact(s) => s,
            EventPattern::Wildcard { source, .. } => source,
        }
    }
}

/// Selection criteria for history queries and replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Exact type or wildcard pattern.
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub correlation_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn by_type(pattern: impl Into<String>) -> Self {
        Self {
            event_type: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
