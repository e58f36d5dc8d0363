//! Events: types, the priority queue and the publisher.

pub mod bus;
mod publisher;
mod queue;
mod subscription;
mod types;

pub use bus::{BusError, EventBus, RedisEventBus};
pub use publisher::{EventPublisher, PublishReport, PublisherStats, SubscribeError};
pub use queue::{EventQueue, QueueStats, BATCH_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY};
pub use subscription::{LocationFilter, Subscription, SubscriptionFilter, SubscriptionId, SubscriptionTarget};
pub use types::{
    Event, EventLocation, EventPayload, EventType, Priority, CHANNEL_PREFIX, DEFAULT_EVENT_RADIUS_KM,
    MANUAL_SOURCE,
};
