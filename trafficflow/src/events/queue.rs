//! Bounded priority queue for events.
//!
//! Events are ordered by priority rank (critical first), then by event
//! timestamp (earlier first), then by enqueue sequence. The sequence makes
//! the order total, so events with identical priority and timestamp come out
//! in the order they were pushed.
//!
//! When the queue is full, a push first discards the current lowest-priority,
//! latest-arriving event. A push therefore always succeeds on an open queue.
//!
//! # Example
//!
//! ```ignore
//! let queue = EventQueue::new(100);
//! queue.push(low_event);
//! queue.push(critical_event);
//!
//! // Critical event comes out first despite being pushed second
//! let next = queue.pop(Duration::from_millis(10)).await.unwrap();
//! assert_eq!(next.priority, Priority::Critical);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::types::{Event, Priority};

/// Default maximum number of queued events.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Longest single wait inside [`EventQueue::pop_batch`].
pub const BATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Queue Key
// =============================================================================

/// Ordering key for a queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueKey {
    rank: u8,
    arrival: DateTime<Utc>,
    sequence: u64,
}

impl Ord for QueueKey {
    /// Rank ascending, then arrival ascending, then sequence ascending.
    /// The smallest key is served first; the largest is dropped on overflow.
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.arrival.cmp(&other.arrival))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    items: BTreeMap<QueueKey, Event>,
    next_sequence: u64,
}

impl QueueState {
    fn key_for(&mut self, event: &Event) -> QueueKey {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        QueueKey {
            rank: event.priority.rank(),
            arrival: event.timestamp,
            sequence,
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total_enqueued: u64,
    pub processed: u64,
    pub dropped: u64,
    pub size: usize,
    pub capacity: usize,
}

// =============================================================================
// Event Queue
// =============================================================================

/// Bounded, thread-safe priority queue.
///
/// Producers call [`push`](Self::push) from any task. A single consumer loop
/// drains it with [`pop`](Self::pop) or [`pop_batch`](Self::pop_batch).
pub struct EventQueue {
    state: Mutex<QueueState>,
    available: Notify,
    capacity: usize,
    closed: AtomicBool,
    total_enqueued: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            total_enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues an event, discarding the lowest-priority event if full.
    ///
    /// Returns `false` only if the queue is closed or has zero capacity.
    pub fn push(&self, event: Event) -> bool {
        if self.capacity == 0 || self.is_closed() {
            return false;
        }

        let dropped = {
            let mut state = self.state.lock();
            let dropped = if state.items.len() >= self.capacity {
                state.items.pop_last().map(|(_, event)| event)
            } else {
                None
            };
            let key = state.key_for(&event);
            state.items.insert(key, event);
            dropped
        };

        self.total_enqueued.fetch_add(1, AtomicOrdering::Relaxed);
        if let Some(dropped) = dropped {
            self.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            warn!(
                event_id = %dropped.id,
                priority = %dropped.priority,
                event_type = %dropped.event_type(),
                "Event queue full, dropped lowest-priority event"
            );
        }

        self.available.notify_one();
        true
    }

    /// Removes the next event without waiting.
    pub fn try_pop(&self) -> Option<Event> {
        self.state.lock().items.pop_first().map(|(_, event)| event)
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout, or immediately once the queue is closed and
    /// empty.
    pub async fn pop(&self, timeout: Duration) -> Option<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push in between is not missed.
            notified.as_mut().enable();

            if let Some(event) = self.try_pop() {
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return self.try_pop(),
            }
        }
    }

    /// Collects up to `max_size` events within `timeout`.
    ///
    /// Waits in slices of at most [`BATCH_POLL_INTERVAL`]. Returns early once
    /// at least one event was collected and the queue runs dry.
    pub async fn pop_batch(&self, max_size: usize, timeout: Duration) -> Vec<Event> {
        let deadline = Instant::now() + timeout;
        let mut batch = Vec::with_capacity(max_size.min(64));

        while batch.len() < max_size {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = (deadline - now).min(BATCH_POLL_INTERVAL);
            match self.pop(wait).await {
                Some(event) => batch.push(event),
                None if !batch.is_empty() || self.is_closed() => break,
                None => {}
            }
        }

        batch
    }

    /// Records that the consumer finished with one event.
    pub fn mark_processed(&self) {
        self.processed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Closes the queue. Pending pops return once the queue is empty.
    pub fn close(&self) {
        if !self.closed.swap(true, AtomicOrdering::AcqRel) {
            debug!(remaining = self.len(), "Event queue closed");
        }
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued events per priority.
    pub fn priority_counts(&self) -> [(Priority, usize); 4] {
        let state = self.state.lock();
        Priority::ALL.map(|p| {
            let rank = p.rank();
            (p, state.items.keys().filter(|k| k.rank == rank).count())
        })
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total_enqueued: self.total_enqueued.load(AtomicOrdering::Relaxed),
            processed: self.processed.load(AtomicOrdering::Relaxed),
            dropped: self.dropped.load(AtomicOrdering::Relaxed),
            size: self.len(),
            capacity: self.capacity,
        }
    }
}
