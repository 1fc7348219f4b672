// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Bus (spec §4.1): a process-wide, per-topic publish/subscribe hub.
//!
//! The teacher wires a single `mpsc::Sender<Event>` from the runtime down to
//! its handlers (`daemon/src/engine/runtime/mod.rs`); this generalizes that
//! to per-topic fan-out with one bounded queue per subscriber, since the
//! gateway needs independent `run.<id>` streams rather than one firehose.
//! Each subscriber's queue is a `Mutex<VecDeque>` shared between publisher
//! and consumer (rather than a `tokio::mpsc` channel) because drop-oldest
//! overflow requires the publisher to evict the queue's head itself; an
//! `mpsc::Sender` has no way to reach into its paired `Receiver` to do that.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use undoable_core::BusEvent;

/// Default bounded queue depth per subscriber (spec §4.1).
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct TopicEvent {
    pub topic: String,
    pub event: BusEvent,
}

struct Queue {
    capacity: usize,
    items: Mutex<VecDeque<TopicEvent>>,
    notify: Notify,
    closed: std::sync::atomic::AtomicBool,
    dropped: std::sync::atomic::AtomicU64,
}

struct Subscriber {
    queue: Arc<Queue>,
}

/// A live subscription. Dropping it releases the subscriber's slot on its
/// topics (spec §4.1 "released when the consumer closes its handle").
pub struct Subscription {
    queue: Arc<Queue>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<TopicEvent> {
        loop {
            if let Some(item) = self.queue.items.lock().pop_front() {
                return Some(item);
            }
            if self.queue.closed.load(std::sync::atomic::Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Count of events dropped for this subscriber due to overflow. Spec
    /// §4.1: "subscribers MUST treat the stream as lossy".
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.closed.store(true, std::sync::atomic::Ordering::Release);
    }
}

#[derive(Default)]
pub struct EventBus {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        self.subscribe_with_capacity(topic, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, topic: impl Into<String>, capacity: usize) -> Subscription {
        let queue = Arc::new(Queue {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
            dropped: std::sync::atomic::AtomicU64::new(0),
        });
        self.topics.lock().entry(topic.into()).or_default().push(Subscriber { queue: queue.clone() });
        Subscription { queue }
    }

    /// Publish preserves per-topic order (spec §5) since subscribers are
    /// drained in registration order and each subscriber's queue is FIFO.
    /// Never blocks: a full queue drops the oldest pending event to make
    /// room for the new one, so consumers always see the most recent state.
    pub fn publish(&self, topic: &str, event: BusEvent) {
        let mut topics = self.topics.lock();
        let Some(subs) = topics.get_mut(topic) else { return };
        subs.retain(|sub| {
            if sub.queue.closed.load(std::sync::atomic::Ordering::Acquire) {
                return false;
            }
            let msg = TopicEvent { topic: topic.to_string(), event: event.clone() };
            let mut items = sub.queue.items.lock();
            if items.len() >= sub.queue.capacity {
                items.pop_front();
                sub.queue.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            items.push_back(msg);
            drop(items);
            sub.queue.notify.notify_one();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("run.1");
        bus.publish("run.1", BusEvent::Done);
        let got = sub.recv().await.expect("event");
        assert_eq!(got.topic, "run.1");
        assert!(matches!(got.event, BusEvent::Done));
    }

    #[tokio::test]
    async fn publish_to_unsubscribed_topic_is_a_noop() {
        let bus = EventBus::new();
        bus.publish("run.nobody-listening", BusEvent::Done);
    }

    #[tokio::test]
    async fn overflow_increments_dropped_counter_without_blocking() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_with_capacity("run.1", 1);
        bus.publish("run.1", BusEvent::Done);
        // Queue now full (capacity 1, unread). This publish must not block.
        bus.publish("run.1", BusEvent::Done);
        assert_eq!(sub.dropped_count(), 1);
        let _ = sub.recv().await;
    }

    #[tokio::test]
    async fn overflow_drops_oldest_event_and_retains_newest() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_with_capacity("run.1", 1);
        bus.publish("run.1", BusEvent::Phase { phase: "oldest".into() });
        bus.publish("run.1", BusEvent::Phase { phase: "newest".into() });
        assert_eq!(sub.dropped_count(), 1);
        let got = sub.recv().await.expect("event");
        match got.event {
            BusEvent::Phase { phase } => assert_eq!(phase, "newest"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_subscription_releases_its_slot() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe("run.1");
            assert_eq!(bus.topics.lock().get("run.1").map(|v| v.len()), Some(1));
        }
        // Publishing after the subscriber is gone prunes the closed sender.
        bus.publish("run.1", BusEvent::Done);
        assert_eq!(bus.topics.lock().get("run.1").map(|v| v.len()), Some(0));
    }
}
