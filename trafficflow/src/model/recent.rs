//! Bounded set of recently seen keys.
//!
//! Used to suppress repeat emission of the same incident. Keys expire after a
//! TTL, and when the set grows past its capacity the oldest keys are dropped.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::clock::SharedClock;

/// Default maximum number of remembered keys.
pub const DEFAULT_RECENT_CAPACITY: usize = 1000;

/// Default time a key is remembered.
pub const DEFAULT_RECENT_TTL: Duration = Duration::from_secs(3600);

/// Size-capped, TTL-capped set of keys.
pub struct RecentSet {
    capacity: usize,
    ttl: chrono::Duration,
    clock: SharedClock,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    seen: HashMap<String, DateTime<Utc>>,
    order: VecDeque<(String, DateTime<Utc>)>,
}

impl Inner {
    fn purge(&mut self, now: DateTime<Utc>, ttl: chrono::Duration) {
        while let Some((_, at)) = self.order.front() {
            if now - *at < ttl {
                break;
            }
            if let Some((key, at)) = self.order.pop_front() {
                self.forget(&key, at);
            }
        }
    }

    // Only remove the map entry if it still belongs to this insertion.
    fn forget(&mut self, key: &str, at: DateTime<Utc>) {
        if self.seen.get(key) == Some(&at) {
            self.seen.remove(key);
        }
    }
}

impl RecentSet {
    pub fn new(capacity: usize, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Records `key`, returning `true` if it was not already remembered.
    pub fn insert(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.purge(now, self.ttl);

        if inner.seen.contains_key(key) {
            return false;
        }

        inner.seen.insert(key.to_string(), now);
        inner.order.push_back((key.to_string(), now));

        while inner.seen.len() > self.capacity {
            match inner.order.pop_front() {
                Some((old, at)) => inner.forget(&old, at),
                None => break,
            }
        }
        true
    }

    /// True if `key` is currently remembered.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.purge(now, self.ttl);
        inner.seen.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.seen.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn set(capacity: usize, ttl_secs: u64) -> (RecentSet, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let set = RecentSet::new(capacity, Duration::from_secs(ttl_secs), clock.clone());
        (set, clock)
    }

    #[test]
    fn test_insert_reports_new_keys_once() {
        let (set, _) = set(10, 60);
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert!(set.insert("b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_keys_expire_after_ttl() {
        let (set, clock) = set(10, 60);
        assert!(set.insert("a"));
        clock.advance(Duration::from_secs(59));
        assert!(set.contains("a"));
        clock.advance(Duration::from_secs(1));
        assert!(!set.contains("a"));
        assert!(set.insert("a"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (set, clock) = set(3, 600);
        for key in ["a", "b", "c", "d"] {
            set.insert(key);
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(set.len(), 3);
        assert!(!set.contains("a"));
        assert!(set.contains("d"));
    }
}
