//! Event fan-out.
//!
//! Publishing an event performs three independent deliveries:
//!
//! 1. **Transport** - the serialized event goes to every registered
//!    connection. Connections found closed are removed after the broadcast.
//! 2. **Bus** - the canonical JSON goes to `traffic_events:{type}`.
//! 3. **Subscriptions** - every active subscription whose filter matches
//!    receives the event on its channel or connection.
//!
//! A failure in one path is logged and counted and does not affect the
//! others. Every send is non-blocking; a full receiver loses that event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bus::EventBus;
use super::subscription::{Subscription, SubscriptionFilter, SubscriptionId, SubscriptionTarget};
use super::types::Event;
use crate::transport::{ConnectionHandle, ConnectionId, SendOutcome, ServerMessage};

/// What happened to one published event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub transport_delivered: usize,
    pub transport_failed: usize,
    pub bus_published: bool,
    pub subscribers_notified: usize,
    pub subscribers_failed: usize,
}

/// Rejected subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("subscription id '{0}' is already in use")]
    IdInUse(SubscriptionId),
}

/// Publisher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub published_events: u64,
    pub transport_deliveries: u64,
    pub transport_failures: u64,
    pub bus_publishes: u64,
    pub bus_failures: u64,
    pub subscriber_notifications: u64,
    pub subscriber_failures: u64,
    pub dropped_connections: u64,
    pub active_connections: usize,
    pub active_subscriptions: usize,
}

#[derive(Default)]
struct Counters {
    published_events: AtomicU64,
    transport_deliveries: AtomicU64,
    transport_failures: AtomicU64,
    bus_publishes: AtomicU64,
    bus_failures: AtomicU64,
    subscriber_notifications: AtomicU64,
    subscriber_failures: AtomicU64,
    dropped_connections: AtomicU64,
}

fn add(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

/// Fans events out to connections, the bus and subscriptions.
///
/// All registry operations are safe to call concurrently with
/// [`publish`](Self::publish).
pub struct EventPublisher {
    connections: DashMap<ConnectionId, ConnectionHandle>,
    subscriptions: DashMap<SubscriptionId, Subscription>,
    bus: Option<Arc<dyn EventBus>>,
    counters: Counters,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EventPublisher {
    pub fn new(bus: Option<Arc<dyn EventBus>>) -> Self {
        Self {
            connections: DashMap::new(),
            subscriptions: DashMap::new(),
            bus,
            counters: Counters::default(),
        }
    }

    // =========================================================================
    // Connections
    // =========================================================================

    pub fn register_connection(&self, handle: ConnectionHandle) -> ConnectionId {
        let id = handle.id();
        self.connections.insert(id, handle);
        info!(connection = %id, total = self.connections.len(), "Connection registered");
        id
    }

    /// Removes a connection and every subscription bound to it.
    pub fn remove_connection(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, sub| sub.connection() != Some(id));
        let dropped_subs = before.saturating_sub(self.subscriptions.len());
        if removed {
            info!(connection = %id, subscriptions = dropped_subs, "Connection removed");
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Registers a subscription, generating an id when none is given.
    ///
    /// An existing subscription with the same id is replaced.
    pub fn subscribe(
        &self,
        id: Option<SubscriptionId>,
        filter: SubscriptionFilter,
        target: SubscriptionTarget,
    ) -> SubscriptionId {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let subscription = Subscription {
            id: id.clone(),
            filter,
            target,
            active: true,
            created_at: Utc::now(),
        };
        self.subscriptions.insert(id.clone(), subscription);
        debug!(subscription_id = %id, "Subscription added");
        id
    }

    /// Registers a subscription delivered to `connection`.
    ///
    /// An existing id may only be replaced by the connection that owns it.
    /// The ownership check and the insert happen under one shard lock.
    pub fn subscribe_connection(
        &self,
        id: Option<SubscriptionId>,
        filter: SubscriptionFilter,
        connection: ConnectionId,
    ) -> Result<SubscriptionId, SubscribeError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let subscription = Subscription {
            id: id.clone(),
            filter,
            target: SubscriptionTarget::Connection(connection),
            active: true,
            created_at: Utc::now(),
        };

        match self.subscriptions.entry(id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().connection() != Some(connection) {
                    return Err(SubscribeError::IdInUse(id));
                }
                existing.insert(subscription);
            }
            Entry::Vacant(slot) => {
                slot.insert(subscription);
            }
        }
        debug!(subscription_id = %id, connection = %connection, "Subscription added");
        Ok(id)
    }

    /// Removes a subscription only if `connection` owns it.
    pub fn unsubscribe_connection(&self, id: &str, connection: ConnectionId) -> bool {
        let removed = self
            .subscriptions
            .remove_if(id, |_, sub| sub.connection() == Some(connection))
            .is_some();
        if removed {
            debug!(subscription_id = %id, connection = %connection, "Subscription removed");
        }
        removed
    }

    /// Removes a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.subscriptions.remove(id).is_some();
        if removed {
            debug!(subscription_id = %id, "Subscription removed");
        }
        removed
    }

    /// The connection a subscription is bound to, if any.
    pub fn subscription_owner(&self, id: &str) -> Option<Option<ConnectionId>> {
        self.subscriptions.get(id).map(|sub| sub.connection())
    }

    /// Pauses or resumes a subscription without removing it.
    pub fn set_active(&self, id: &str, active: bool) -> bool {
        match self.subscriptions.get_mut(id) {
            Some(mut sub) => {
                sub.active = active;
                true
            }
            None => false,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Delivers `event` on every path. Never fails as a whole.
    pub async fn publish(&self, event: &Event) -> PublishReport {
        let mut report = PublishReport::default();
        let shared = Arc::new(event.clone());

        self.broadcast(&shared, &mut report);
        report.bus_published = self.publish_to_bus(event).await;
        self.notify_subscribers(&shared, &mut report);

        self.counters.published_events.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_id = %event.id,
            event_type = %event.event_type(),
            priority = %event.priority,
            delivered = report.transport_delivered,
            subscribers = report.subscribers_notified,
            "Event published"
        );
        report
    }

    fn broadcast(&self, event: &Arc<Event>, report: &mut PublishReport) {
        if self.connections.is_empty() {
            return;
        }

        let frame = ServerMessage::TrafficEvent {
            subscription_id: None,
            data: Event::clone(event),
            timestamp: Utc::now(),
        }
        .to_json();

        let mut closed = Vec::new();
        for entry in self.connections.iter() {
            match entry.value().try_send(frame.clone()) {
                SendOutcome::Sent => report.transport_delivered += 1,
                SendOutcome::Full => {
                    report.transport_failed += 1;
                    warn!(connection = %entry.key(), event_id = %event.id, "Connection backlogged, frame dropped");
                }
                SendOutcome::Closed => {
                    report.transport_failed += 1;
                    closed.push(*entry.key());
                }
            }
        }

        // Removal waits until every handle had its attempt.
        for id in closed {
            if self.remove_connection(id) {
                self.counters.dropped_connections.fetch_add(1, Ordering::Relaxed);
            }
        }

        add(&self.counters.transport_deliveries, report.transport_delivered);
        add(&self.counters.transport_failures, report.transport_failed);
    }

    async fn publish_to_bus(&self, event: &Event) -> bool {
        let Some(bus) = &self.bus else {
            return false;
        };

        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Failed to encode event for bus");
                self.counters.bus_failures.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        let channel = event.channel();
        match bus.publish(&channel, &payload).await {
            Ok(()) => {
                self.counters.bus_publishes.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(event_id = %event.id, channel = %channel, error = %e, "Bus publish failed");
                self.counters.bus_failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    fn notify_subscribers(&self, event: &Arc<Event>, report: &mut PublishReport) {
        let mut closed = Vec::new();

        for entry in self.subscriptions.iter() {
            let sub = entry.value();
            if !sub.matches(event) {
                continue;
            }

            let delivered = match &sub.target {
                SubscriptionTarget::Channel(tx) => match tx.try_send(Arc::clone(event)) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!(subscription_id = %sub.id, event_id = %event.id, "Subscriber backlogged, event dropped");
                        false
                    }
                    Err(TrySendError::Closed(_)) => {
                        closed.push(sub.id.clone());
                        false
                    }
                },
                SubscriptionTarget::Connection(conn) => self.deliver_to_connection(*conn, &sub.id, event),
            };

            if delivered {
                report.subscribers_notified += 1;
            } else {
                report.subscribers_failed += 1;
            }
        }

        for id in closed {
            debug!(subscription_id = %id, "Subscriber channel closed, removing");
            self.subscriptions.remove(&id);
        }

        add(&self.counters.subscriber_notifications, report.subscribers_notified);
        add(&self.counters.subscriber_failures, report.subscribers_failed);
    }

    fn deliver_to_connection(&self, conn: ConnectionId, subscription_id: &str, event: &Event) -> bool {
        let Some(handle) = self.connections.get(&conn) else {
            debug!(connection = %conn, subscription_id = %subscription_id, "Subscription connection not registered");
            return false;
        };

        let frame = ServerMessage::TrafficEvent {
            subscription_id: Some(subscription_id.to_string()),
            data: event.clone(),
            timestamp: Utc::now(),
        }
        .to_json();

        match handle.try_send(frame) {
            SendOutcome::Sent => true,
            outcome => {
                warn!(connection = %conn, subscription_id = %subscription_id, ?outcome, "Subscription delivery failed");
                false
            }
        }
    }

    pub fn stats(&self) -> PublisherStats {
        let c = &self.counters;
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        PublisherStats {
            published_events: get(&c.published_events),
            transport_deliveries: get(&c.transport_deliveries),
            transport_failures: get(&c.transport_failures),
            bus_publishes: get(&c.bus_publishes),
            bus_failures: get(&c.bus_failures),
            subscriber_notifications: get(&c.subscriber_notifications),
            subscriber_failures: get(&c.subscriber_failures),
            dropped_connections: get(&c.dropped_connections),
            active_connections: self.connections.len(),
            active_subscriptions: self.subscriptions.len(),
        }
    }
}
