//! Collector statistics and cycle reports.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::CacheStats;
use crate::events::{PublisherStats, QueueStats};

/// Outcome of checking one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationReport {
    pub location: String,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub observations: usize,
    pub incidents: usize,
    pub events_detected: usize,
    pub events_enqueued: usize,
    pub quality_score: f64,
}

/// Outcome of one monitoring cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub locations: Vec<LocationReport>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn events_enqueued(&self) -> usize {
        self.locations.iter().map(|l| l.events_enqueued).sum()
    }

    pub fn sources_failed(&self) -> usize {
        self.locations.iter().map(|l| l.sources_failed).sum()
    }

    /// True when sources were called and none of them answered.
    pub fn all_sources_failed(&self) -> bool {
        let ok: usize = self.locations.iter().map(|l| l.sources_ok).sum();
        ok == 0 && self.sources_failed() > 0
    }
}

/// Point-in-time collector statistics.
#[derive(Debug, Clone)]
pub struct CollectorStats {
    pub cycles: u64,
    pub events_detected: u64,
    pub events_processed: u64,
    pub processing_errors: u64,
    pub source_failures: u64,
    pub locations: usize,
    pub running: bool,
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub queue: QueueStats,
    pub publisher: PublisherStats,
    pub cache: CacheStats,
}

impl fmt::Display for CollectorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles, {} detected, {} processed, {} errors, queue {}/{} ({} dropped), cache {}",
            self.cycles,
            self.events_detected,
            self.events_processed,
            self.processing_errors,
            self.queue.size,
            self.queue.capacity,
            self.queue.dropped,
            self.cache
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct CollectorCounters {
    pub cycles: AtomicU64,
    pub events_detected: AtomicU64,
    pub events_processed: AtomicU64,
    pub processing_errors: AtomicU64,
    pub source_failures: AtomicU64,
}

impl CollectorCounters {
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
