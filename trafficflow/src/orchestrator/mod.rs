//! Event-driven collector.
//!
//! Owns the monitoring and consumer loops and wires every pipeline stage:
//!
//! ```text
//!  ┌───────────────── monitoring loop (every poll_interval) ─────────────────┐
//!  │  for each watched location (bounded concurrency):                       │
//!  │    observation sources ─┐                                               │
//!  │                         ├─ join all (per-source timeout) ─► fuse ─► cache│
//!  │    incident sources ────┘                                  │            │
//!  │                                                             ▼            │
//!  │                                                      detect ─► queue     │
//!  └─────────────────────────────────────────────────────────────────────────┘
//!  ┌───────────────── consumer loop (single task) ───────────────────────────┐
//!  │  pop_batch ─► publish ─► mark processed ─► cache "event:{id}"           │
//!  └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failing source, location or subscriber never stops either loop.

mod collector;
mod config;
mod stats;

pub use collector::{CollectorBuilder, CollectorError, CollectorHandle, EventDrivenCollector};
pub use config::{
    CollectorConfig, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT, DEFAULT_ERROR_BACKOFF, DEFAULT_EVENT_TTL,
    DEFAULT_INCIDENT_MAX_AGE, DEFAULT_MAX_CONCURRENT_LOCATIONS, DEFAULT_POLL_INTERVAL, DEFAULT_SNAPSHOT_DOMAIN,
    DEFAULT_SNAPSHOT_TTL, DEFAULT_SOURCE_TIMEOUT,
};
pub use stats::{CollectorStats, CycleReport, LocationReport};
