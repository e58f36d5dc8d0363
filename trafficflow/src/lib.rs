//! TrafficFlow - traffic event detection and dispatch
//!
//! This library ingests traffic observations and incident reports, fuses them
//! into a quality-scored snapshot per watched location, detects notable
//! conditions and dispatches them as prioritized events to live subscribers.
//!
//! # Pipeline
//!
//! ```text
//! sources ─► FusionEngine ─► DetectionEngine ─► EventQueue ─► consumer ─► EventPublisher
//!                 │                                               │           ├─► transport connections
//!                 ▼                                               ▼           ├─► pub/sub bus
//!            TieredCache ◄────────────────────────────────────────┘           └─► subscriptions
//! ```
//!
//! The [`orchestrator::EventDrivenCollector`] owns the loops and wires the
//! components together. Every component receives its collaborators explicitly;
//! there is no process-wide cache or publisher.

pub mod cache;
pub mod clock;
pub mod config;
pub mod detection;
pub mod events;
pub mod fusion;
pub mod geo;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod source;
pub mod transport;

pub use cache::TieredCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigFile};
pub use events::{Event, EventPublisher, EventQueue, EventType, Priority};
pub use fusion::FusionEngine;
pub use geo::{FlatPlane, GeoPoint};
pub use orchestrator::EventDrivenCollector;
