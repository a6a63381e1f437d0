// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event hub: an observational broadcast of lifecycle events,
//! never on the critical path of correctness.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Default number of recent events retained for late subscribers.
pub const DEFAULT_RING_CAPACITY: usize = 256;

/// One published event, with a monotonically increasing id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: String,
    pub data: Value,
    pub at: DateTime<Utc>,
}

/// A bounded broadcast of [`Event`]s plus a replay ring for subscribers
/// that connect after some events were already published.
///
/// Publishing never blocks on a slow subscriber: `tokio::sync::broadcast`
/// drops the oldest buffered message for a lagging receiver rather than
/// stalling the sender, so one stuck observer can never back-pressure
/// the scheduler or dispatcher.
pub struct EventHub {
    tx: broadcast::Sender<Event>,
    ring: Mutex<VecDeque<Event>>,
    ring_capacity: usize,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new(ring_capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(ring_capacity.max(16));
        Self { tx, ring: Mutex::new(VecDeque::with_capacity(ring_capacity)), ring_capacity, next_id: AtomicU64::new(1) }
    }

    pub fn publish(&self, event_type: impl Into<String>, data: Value) -> Event {
        let event = Event { id: self.next_id.fetch_add(1, Ordering::SeqCst), event_type: event_type.into(), data, at: Utc::now() };

        let mut ring = self.ring.lock();
        ring.push_back(event.clone());
        while ring.len() > self.ring_capacity {
            ring.pop_front();
        }
        drop(ring);

        // No subscribers is not an error; the event is still retained in the ring.
        let _ = self.tx.send(event.clone());
        event
    }

    /// A fresh subscription. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Replay every retained event with `id > last_id`, oldest first.
    pub fn snapshot_since(&self, last_id: u64) -> Vec<Event> {
        self.ring.lock().iter().filter(|e| e.id > last_id).cloned().collect()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
