// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Cross-Domain Pub/Sub
//
// In-process publish/subscribe with exact and wildcard subscriptions,
// one-shot handlers, bridges between domain vocabularies, correlation joins
// and a bounded history that can be replayed.
//
// In-memory only: history is lost on restart.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::domain::events::{Event, EventFilter, EventPattern};

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Subscription callback. Errors and panics are logged and isolated.
pub type EventHandler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Callback for a completed correlation join, in `required_types` order.
pub type CorrelationHandler = Arc<dyn Fn(Vec<Event>) -> HandlerFuture + Send + Sync>;

/// Payload rewrite applied by a bridge.
pub type EventTransform = Arc<dyn Fn(&Event) -> serde_json::Value + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Wrap an async closure as a [`CorrelationHandler`].
pub fn correlation_handler<F, Fut>(f: F) -> CorrelationHandler
where
    F: Fn(Vec<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |events| f(events).boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    handler: EventHandler,
    once: bool,
}

struct BusState {
    subscriptions: Vec<Subscription>,
    history: VecDeque<Event>,
}

struct Inner {
    state: Mutex<BusState>,
    max_history: usize,
    next_subscription: AtomicU64,
    emitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of bus counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EventBusStats {
    pub emitted: u64,
    pub delivered: u64,
    pub handler_failures: u64,
    pub subscriptions: usize,
    pub history_len: usize,
}

/// Cross-domain event bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    /// Create a new event bus retaining at most `max_history` events
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BusState {
                    subscriptions: Vec::new(),
                    history: VecDeque::with_capacity(max_history.min(1024)),
                }),
                max_history: max_history.max(1),
                next_subscription: AtomicU64::new(1),
                emitted: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Create event bus with default history (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Subscribe to an exact type or wildcard pattern
    pub fn on(&self, pattern: &str, handler: EventHandler) -> Result<SubscriptionId, EventBusError> {
        self.subscribe(pattern, handler, false)
    }

    /// Subscribe for the next matching event only
    pub fn once(&self, pattern: &str, handler: EventHandler) -> Result<SubscriptionId, EventBusError> {
        self.subscribe(pattern, handler, true)
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: EventHandler,
        once: bool,
    ) -> Result<SubscriptionId, EventBusError> {
        let compiled = compile(pattern)?;
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));

        self.inner.state.lock().subscriptions.push(Subscription {
            id,
            pattern: compiled,
            handler,
            once,
        });

        debug!(pattern, subscription = id.0, once, "Subscribed to events");
        Ok(id)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        state.subscriptions.len() != before
    }

    /// Remove every subscription registered with this pattern and handler.
    pub fn off(&self, pattern: &str, handler: &EventHandler) -> usize {
        let mut state = self.inner.state.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| {
            !(s.pattern.as_str() == pattern
                && std::ptr::addr_eq(Arc::as_ptr(&s.handler), Arc::as_ptr(handler)))
        });
        before - state.subscriptions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Record the event in history and deliver it to every matching
    /// subscription. Returns the number of handlers invoked.
    pub async fn emit(&self, event: Event) -> usize {
        self.record(&event);
        self.inner.emitted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hive_events_emitted_total").increment(1);
        self.dispatch(event).await
    }

    fn record(&self, event: &Event) {
        let mut state = self.inner.state.lock();
        state.history.push_back(event.clone());
        while state.history.len() > self.inner.max_history {
            state.history.pop_front();
        }
    }

    /// Collect matching handlers, detaching one-shot subscriptions so that a
    /// concurrent emission cannot fire them twice.
    fn matching_handlers(&self, event_type: &str) -> Vec<(SubscriptionId, EventHandler)> {
        let mut state = self.inner.state.lock();
        let mut matched = Vec::new();
        state.subscriptions.retain(|s| {
            if !s.pattern.matches(event_type) {
                return true;
            }
            matched.push((s.id, s.handler.clone()));
            !s.once
        });
        matched
    }

    async fn dispatch(&self, event: Event) -> usize {
        let handlers = self.matching_handlers(&event.event_type);
        if handlers.is_empty() {
            debug!(event_type = %event.event_type, "No subscribers listening to event");
            return 0;
        }

        let count = handlers.len();
        let deliveries = handlers.into_iter().map(|(id, handler)| {
            let event = event.clone();
            let event_type = event.event_type.clone();
            async move {
                let outcome = AssertUnwindSafe(async move { handler(event).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!(event_type = %event_type, subscription = id.0, "Event handler failed: {:#}", e);
                        false
                    }
                    Err(_) => {
                        error!(event_type = %event_type, subscription = id.0, "Event handler panicked");
                        false
                    }
                }
            }
        });

        let results = join_all(deliveries).await;
        let failures = results.iter().filter(|ok| !**ok).count() as u64;

        self.inner.delivered.fetch_add(count as u64, Ordering::Relaxed);
        if failures > 0 {
            self.inner.failed.fetch_add(failures, Ordering::Relaxed);
            metrics::counter!("hive_event_handler_failures_total").increment(failures);
        }

        count
    }

    /// Wait for the next event matching `pattern`
    pub async fn wait_for(&self, pattern: &str, timeout: Duration) -> Result<Event, EventBusError> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));

        let id = self.once(
            pattern,
            handler(move |event| {
                let slot = slot.clone();
                async move {
                    if let Some(tx) = slot.lock().take() {
                        let _ = tx.send(event);
                    }
                    Ok(())
                }
            }),
        )?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(EventBusError::Closed),
            Err(_) => {
                self.unsubscribe(id);
                Err(EventBusError::Timeout {
                    pattern: pattern.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Forward events matching `source_pattern` as new `target_type` events,
    /// correlated to the original event's id.
    pub fn bridge(
        &self,
        source_pattern: &str,
        target_type: &str,
        transform: Option<EventTransform>,
    ) -> Result<SubscriptionId, EventBusError> {
        if compile(source_pattern)?.matches(target_type) {
            return Err(EventBusError::BridgeLoop {
                source_pattern: source_pattern.to_string(),
                target_type: target_type.to_string(),
            });
        }

        let bus: Weak<Inner> = Arc::downgrade(&self.inner);
        let target_type = target_type.to_string();

        self.on(
            source_pattern,
            handler(move |event| {
                let bus = bus.clone();
                let target_type = target_type.clone();
                let transform = transform.clone();
                async move {
                    let Some(inner) = bus.upgrade() else {
                        return Ok(());
                    };
                    let payload = match &transform {
                        Some(transform) => transform(&event),
                        None => event.payload.clone(),
                    };
                    let forwarded = Event::new(target_type, payload, event.source.clone())
                        .with_correlation_id(event.id.to_string());

                    EventBus { inner }.emit(forwarded).await;
                    Ok(())
                }
            }),
        )
    }

    /// Fire `joined` once every type in `required_types` has been observed
    /// with the same correlation id. Partial sets older than `timeout` are
    /// discarded. A correlation id joins at most once for the lifetime of the
    /// returned subscriptions; fired ids are released once all of them are
    /// unsubscribed. Returns the subscriptions backing the join.
    pub fn correlate(
        &self,
        required_types: &[&str],
        joined: CorrelationHandler,
        timeout: Duration,
    ) -> Result<Vec<SubscriptionId>, EventBusError> {
        if required_types.is_empty() {
            return Err(EventBusError::EmptyCorrelation);
        }
        for pattern in required_types {
            compile(pattern)?;
        }

        let required: Arc<Vec<String>> =
            Arc::new(required_types.iter().map(|s| s.to_string()).collect());
        let joins = Arc::new(Mutex::new(CorrelationState::default()));

        let mut ids = Vec::with_capacity(required.len());
        for slot in 0..required.len() {
            let pattern = required[slot].clone();
            let required = required.clone();
            let joins = joins.clone();
            let joined = joined.clone();

            let subscription = self.on(
                &pattern,
                handler(move |event| {
                    let required = required.clone();
                    let joins = joins.clone();
                    let joined = joined.clone();
                    async move {
                        let Some(correlation_id) = event.correlation_id.clone() else {
                            return Ok(());
                        };
                        let complete = joins.lock().observe(
                            correlation_id,
                            slot,
                            event,
                            required.len(),
                            timeout,
                        );
                        match complete {
                            Some(events) => joined(events).await,
                            None => Ok(()),
                        }
                    }
                }),
            );

            match subscription {
                Ok(id) => ids.push(id),
                Err(e) => {
                    for id in ids {
                        self.unsubscribe(id);
                    }
                    return Err(e);
                }
            }
        }

        Ok(ids)
    }

    /// Historical events matching `filter`, oldest first
    pub fn get_history(&self, filter: &EventFilter) -> Result<Vec<Event>, EventBusError> {
        let pattern = filter.event_type.as_deref().map(compile).transpose()?;

        let state = self.inner.state.lock();
        let mut events: Vec<Event> = state
            .history
            .iter()
            .filter(|e| pattern.as_ref().is_none_or(|p| p.matches(&e.event_type)))
            .filter(|e| filter.source.as_ref().is_none_or(|s| &e.source == s))
            .filter(|e| {
                filter
                    .correlation_id
                    .as_ref()
                    .is_none_or(|c| e.correlation_id.as_ref() == Some(c))
            })
            .filter(|e| filter.since.is_none_or(|since| e.timestamp >= since))
            .cloned()
            .collect();
        drop(state);

        if let Some(limit) = filter.limit {
            let skip = events.len().saturating_sub(limit);
            events.drain(..skip);
        }

        Ok(events)
    }

    /// Deliver matching historical events to the current subscribers again.
    /// Replayed events are not re-recorded in history.
    pub async fn replay(&self, filter: &EventFilter) -> Result<usize, EventBusError> {
        let events = self.get_history(filter)?;
        let count = events.len();
        for event in events {
            self.dispatch(event).await;
        }
        debug!(count, "Replayed events from history");
        Ok(count)
    }

    pub fn stats(&self) -> EventBusStats {
        let state = self.inner.state.lock();
        EventBusStats {
            emitted: self.inner.emitted.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            handler_failures: self.inner.failed.load(Ordering::Relaxed),
            subscriptions: state.subscriptions.len(),
            history_len: state.history.len(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn compile(pattern: &str) -> Result<EventPattern, EventBusError> {
    EventPattern::parse(pattern).map_err(|source| EventBusError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

struct PendingJoin {
    started: Instant,
    events: Vec<Option<Event>>,
}

#[derive(Default)]
struct CorrelationState {
    pending: HashMap<String, PendingJoin>,
    // Never pruned: a completed id must not join twice.
    fired: HashSet<String>,
}

impl CorrelationState {
    /// Buffer `event` in `slot`; returns the full set when the join completes.
    fn observe(
        &mut self,
        correlation_id: String,
        slot: usize,
        event: Event,
        width: usize,
        timeout: Duration,
    ) -> Option<Vec<Event>> {
        let now = Instant::now();
        self.pending
            .retain(|_, join| now.duration_since(join.started) <= timeout);

        if self.fired.contains(&correlation_id) {
            return None;
        }

        let join = self
            .pending
            .entry(correlation_id.clone())
            .or_insert_with(|| PendingJoin {
                started: now,
                events: vec![None; width],
            });
        if join.events[slot].is_none() {
            join.events[slot] = Some(event);
        }

        if join.events.iter().any(Option::is_none) {
            return None;
        }

        let join = self.pending.remove(&correlation_id)?;
        self.fired.insert(correlation_id);
        join.events.into_iter().collect()
    }
}

/// Errors that can occur on the event bus
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Invalid event pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Timed out after {timeout_ms}ms waiting for '{pattern}'")]
    Timeout { pattern: String, timeout_ms: u64 },

    #[error("Bridge from '{source_pattern}' to '{target_type}' would re-forward its own output")]
    BridgeLoop {
        source_pattern: String,
        target_type: String,
    },

    #[error("Correlation requires at least one event type")]
    EmptyCorrelation,

    #[error("Event bus is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        handler(move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_once_fires_a_single_time() {
        let bus = EventBus::new(10);
        let hits = Arc::new(AtomicUsize::new(0));
        bus.once("agent:*", counting_handler(hits.clone())).unwrap();

        bus.emit(Event::new("agent:registered", json!({}), "test")).await;
        bus.emit(Event::new("agent:registered", json!({}), "test")).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_off_matches_pattern_and_handler() {
        let bus = EventBus::new(10);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = counting_handler(hits.clone());
        let other = counting_handler(hits.clone());

        bus.on("task:completed", h.clone()).unwrap();
        bus.on("task:*", h.clone()).unwrap();
        bus.on("task:completed", other).unwrap();

        assert_eq!(bus.off("task:completed", &h), 1);
        assert_eq!(bus.subscription_count(), 2);

        bus.emit(Event::new("task:completed", json!({}), "test")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_history_is_fifo_trimmed() {
        let bus = EventBus::new(3);
        for i in 0..5 {
            bus.emit(Event::new("tick", json!({ "i": i }), "test")).await;
        }

        let history = bus.get_history(&EventFilter::default()).unwrap();
        let seen: Vec<i64> = history.iter().map(|e| e.payload["i"].as_i64().unwrap()).collect();
        assert_eq!(seen, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_history_filters() {
        let bus = EventBus::new(10);
        bus.emit(Event::new("task:completed", json!(1), "swarm")).await;
        bus.emit(Event::new("task:failed", json!(2), "swarm")).await;
        bus.emit(Event::new("pattern:stored", json!(3), "cortex").with_correlation_id("c1")).await;

        assert_eq!(bus.get_history(&EventFilter::by_type("task:*")).unwrap().len(), 2);
        assert_eq!(bus.get_history(&EventFilter::default().with_source("cortex")).unwrap().len(), 1);
        assert_eq!(
            bus.get_history(&EventFilter::default().with_correlation_id("c1")).unwrap()[0].payload,
            json!(3)
        );
        let latest = bus.get_history(&EventFilter::by_type("task:*").with_limit(1)).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].event_type, "task:failed");
    }

    #[tokio::test]
    async fn test_bridge_rejects_self_loop() {
        let bus = EventBus::new(10);
        let err = bus.bridge("task:*", "task:mirrored", None).unwrap_err();
        assert!(matches!(err, EventBusError::BridgeLoop { .. }));
    }

    #[tokio::test]
    async fn test_invalid_correlation() {
        let bus = EventBus::new(10);
        let joined = correlation_handler(|_events| async { Ok(()) });
        assert!(matches!(
            bus.correlate(&[], joined, Duration::from_secs(1)),
            Err(EventBusError::EmptyCorrelation)
        ));
    }

    #[tokio::test]
    async fn test_stats_count_failures() {
        let bus = EventBus::new(10);
        bus.on("x", handler(|_e| async { anyhow::bail!("nope") })).unwrap();
        bus.on("x", handler(|_e| async { Ok(()) })).unwrap();

        assert_eq!(bus.emit(Event::new("x", json!(null), "test")).await, 2);

        let stats = bus.stats();
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.handler_failures, 1);
        assert_eq!(stats.history_len, 1);
    }
}
