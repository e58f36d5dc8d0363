//! Standing subscriptions and their filters.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::types::{Event, EventType, Priority};
use crate::geo::{FlatPlane, GeoPoint};
use crate::transport::ConnectionId;

/// Subscription identifier.
pub type SubscriptionId = String;

/// Circular area a subscriber cares about.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFilter {
    pub center_lng: f64,
    pub center_lat: f64,
    pub radius_km: f64,
}

impl LocationFilter {
    pub fn new(center: GeoPoint, radius_km: f64) -> Self {
        Self {
            center_lng: center.lng,
            center_lat: center.lat,
            radius_km,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.center_lng, self.center_lat)
    }

    /// True when the event's area reaches this filter's area.
    pub fn accepts(&self, event: &Event) -> bool {
        FlatPlane::within(
            self.center(),
            self.radius_km,
            event.location.point(),
            event.location.radius_km,
        )
    }
}

/// Conjunctive event filter.
///
/// An event matches when its type and priority are both accepted and, if any
/// location filters are given, at least one of them accepts its location.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionFilter {
    pub event_types: HashSet<EventType>,
    pub priorities: HashSet<Priority>,
    pub locations: Vec<LocationFilter>,
}

impl SubscriptionFilter {
    /// Accepts every event.
    pub fn all() -> Self {
        Self {
            event_types: EventType::ALL.into_iter().collect(),
            priorities: Priority::ALL.into_iter().collect(),
            locations: Vec::new(),
        }
    }

    pub fn new(
        event_types: impl IntoIterator<Item = EventType>,
        priorities: impl IntoIterator<Item = Priority>,
        locations: Vec<LocationFilter>,
    ) -> Self {
        Self {
            event_types: event_types.into_iter().collect(),
            priorities: priorities.into_iter().collect(),
            locations,
        }
    }

    pub fn with_location(mut self, filter: LocationFilter) -> Self {
        self.locations.push(filter);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.event_types.contains(&event.event_type())
            && self.priorities.contains(&event.priority)
            && (self.locations.is_empty() || self.locations.iter().any(|f| f.accepts(event)))
    }
}

/// Where a subscription's events go.
#[derive(Clone, Debug)]
pub enum SubscriptionTarget {
    /// In-process receiver. Sends never block; a full channel drops the event.
    Channel(mpsc::Sender<Arc<Event>>),
    /// A live transport connection.
    Connection(ConnectionId),
}

/// A registered subscription.
#[derive(Clone, Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub filter: SubscriptionFilter,
    pub target: SubscriptionTarget,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn matches(&self, event: &Event) -> bool {
        self.active && self.filter.matches(event)
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        match self.target {
            SubscriptionTarget::Connection(id) => Some(id),
            SubscriptionTarget::Channel(_) => None,
        }
    }
}
