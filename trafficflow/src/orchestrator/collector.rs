//! The event-driven collector.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::CollectorConfig;
use super::stats::{CollectorCounters, CollectorStats, CycleReport, LocationReport};
use crate::cache::{event_key, snapshot_key, TieredCache, TieredCacheConfig};
use crate::clock::{system_clock, Clock, SharedClock};
use crate::detection::{DetectionConfig, DetectionEngine};
use crate::events::{
    Event, EventLocation, EventPublisher, EventQueue, Priority, SubscriptionFilter, SubscriptionId,
    SubscriptionTarget,
};
use crate::fusion::{DefaultQualityChecker, FusionEngine, QualityChecker};
use crate::geo::FlatPlane;
use crate::model::{FusedSnapshot, IncidentReport, TrafficObservation, WatchedLocation};
use crate::source::{IncidentSource, ObservationSource, SourceError};

/// Errors starting the collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector is already running")]
    AlreadyRunning,
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles an [`EventDrivenCollector`].
///
/// Components not supplied get defaults: a memory-only cache, a publisher
/// without a bus, a default-capacity queue and the system clock.
pub struct CollectorBuilder {
    config: CollectorConfig,
    detection: DetectionConfig,
    checker: Option<Arc<dyn QualityChecker>>,
    locations: Vec<WatchedLocation>,
    observation_sources: Vec<Arc<dyn ObservationSource>>,
    incident_sources: Vec<Arc<dyn IncidentSource>>,
    queue: Option<Arc<EventQueue>>,
    publisher: Option<Arc<EventPublisher>>,
    cache: Option<Arc<TieredCache>>,
    clock: Option<SharedClock>,
}

impl CollectorBuilder {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            detection: DetectionConfig::default(),
            checker: None,
            locations: Vec::new(),
            observation_sources: Vec::new(),
            incident_sources: Vec::new(),
            queue: None,
            publisher: None,
            cache: None,
            clock: None,
        }
    }

    pub fn detection(mut self, config: DetectionConfig) -> Self {
        self.detection = config;
        self
    }

    pub fn quality_checker(mut self, checker: Arc<dyn QualityChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn location(mut self, location: WatchedLocation) -> Self {
        self.locations.push(location);
        self
    }

    pub fn locations(mut self, locations: impl IntoIterator<Item = WatchedLocation>) -> Self {
        self.locations.extend(locations);
        self
    }

    pub fn observation_source(mut self, source: Arc<dyn ObservationSource>) -> Self {
        self.observation_sources.push(source);
        self
    }

    pub fn incident_source(mut self, source: Arc<dyn IncidentSource>) -> Self {
        self.incident_sources.push(source);
        self
    }

    pub fn queue(mut self, queue: Arc<EventQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn publisher(mut self, publisher: Arc<EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn cache(mut self, cache: Arc<TieredCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> EventDrivenCollector {
        let clock = self.clock.unwrap_or_else(system_clock);
        let checker = self
            .checker
            .unwrap_or_else(|| Arc::new(DefaultQualityChecker::default()));
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(TieredCache::new(
                &TieredCacheConfig::default().memory_only(),
                None,
                clock.clone(),
            ))
        });

        EventDrivenCollector {
            inner: Arc::new(Inner {
                fusion: FusionEngine::new(checker, clock.clone()),
                detection: DetectionEngine::new(self.detection, clock.clone()),
                locations: RwLock::new(self.locations),
                observation_sources: self.observation_sources,
                incident_sources: self.incident_sources,
                queue: self.queue.unwrap_or_default(),
                publisher: self.publisher.unwrap_or_default(),
                cache,
                started_at: clock.now(),
                clock,
                config: self.config,
                running: AtomicBool::new(false),
                counters: CollectorCounters::default(),
            }),
        }
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Polls watched locations and dispatches detected events.
///
/// Cheap to clone; clones share the same pipeline.
#[derive(Clone)]
pub struct EventDrivenCollector {
    inner: Arc<Inner>,
}

struct Inner {
    config: CollectorConfig,
    locations: RwLock<Vec<WatchedLocation>>,
    observation_sources: Vec<Arc<dyn ObservationSource>>,
    incident_sources: Vec<Arc<dyn IncidentSource>>,
    fusion: FusionEngine,
    detection: DetectionEngine,
    queue: Arc<EventQueue>,
    publisher: Arc<EventPublisher>,
    cache: Arc<TieredCache>,
    clock: SharedClock,
    started_at: DateTime<Utc>,
    running: AtomicBool,
    counters: CollectorCounters,
}

/// Running collector tasks.
pub struct CollectorHandle {
    shutdown: CancellationToken,
    queue: Arc<EventQueue>,
    tasks: Vec<JoinHandle<()>>,
}

impl CollectorHandle {
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancels the loops and waits for them to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.queue.close();
        self.wait().await;
    }

    /// Waits for the loops to finish without cancelling them.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Collector task ended abnormally");
            }
        }
    }
}

impl EventDrivenCollector {
    pub fn builder(config: CollectorConfig) -> CollectorBuilder {
        CollectorBuilder::new(config)
    }

    /// Spawns the monitoring loop, the consumer loop and the cache sweeper.
    ///
    /// Cancelling `shutdown` stops all three.
    pub fn start(&self, shutdown: CancellationToken) -> Result<CollectorHandle, CollectorError> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(CollectorError::AlreadyRunning);
        }

        info!(
            locations = self.inner.locations.read().len(),
            observation_sources = self.inner.observation_sources.len(),
            incident_sources = self.inner.incident_sources.len(),
            poll_interval_secs = self.inner.config.poll_interval.as_secs(),
            "Starting event-driven collector"
        );

        let tasks = vec![
            tokio::spawn(Arc::clone(&self.inner).monitor_loop(shutdown.clone())),
            tokio::spawn(Arc::clone(&self.inner).consumer_loop(shutdown.clone())),
            self.inner.cache.spawn_sweeper(shutdown.clone()),
        ];

        Ok(CollectorHandle {
            shutdown,
            queue: Arc::clone(&self.inner.queue),
            tasks,
        })
    }

    /// Runs one monitoring cycle over every watched location.
    pub async fn run_cycle(&self) -> CycleReport {
        self.inner.run_cycle().await
    }

    /// Publishes one batch from the queue. Returns how many events were processed.
    pub async fn process_batch(&self) -> usize {
        let batch = self
            .inner
            .queue
            .pop_batch(self.inner.config.batch_size, self.inner.config.batch_timeout)
            .await;
        let count = batch.len();
        for event in batch {
            self.inner.process_event(event).await;
        }
        count
    }

    /// Queues a manually created event. Returns its id, or `None` if the
    /// queue refused it.
    pub fn create_custom_event(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        location: EventLocation,
        data: serde_json::Map<String, serde_json::Value>,
        priority: Option<Priority>,
    ) -> Option<String> {
        let mut event = Event::custom(title, description, location, data, self.inner.clock.now());
        if let Some(priority) = priority {
            event = event.with_priority(priority);
        }
        let id = event.id.clone();
        if self.inner.queue.push(event) {
            CollectorCounters::add(&self.inner.counters.events_detected, 1);
            info!(event_id = %id, "Custom event queued");
            Some(id)
        } else {
            warn!(event_id = %id, "Queue refused custom event");
            None
        }
    }

    pub fn subscribe(
        &self,
        id: Option<SubscriptionId>,
        filter: SubscriptionFilter,
        target: SubscriptionTarget,
    ) -> SubscriptionId {
        self.inner.publisher.subscribe(id, filter, target)
    }

    pub fn unsubscribe(&self, id: &str) -> bool {
        self.inner.publisher.unsubscribe(id)
    }

    pub fn add_location(&self, location: WatchedLocation) {
        info!(location = %location.name, "Watching location");
        self.inner.locations.write().push(location);
    }

    pub fn remove_location(&self, name: &str) -> bool {
        let mut locations = self.inner.locations.write();
        let before = locations.len();
        locations.retain(|l| l.name != name);
        locations.len() != before
    }

    /// Most recent cached snapshot for `location`.
    pub async fn latest_snapshot(&self, location: &WatchedLocation) -> Option<FusedSnapshot> {
        let key = snapshot_key(&self.inner.config.snapshot_domain, location.center);
        self.inner.cache.get(&key).await
    }

    /// A processed event from the cache, for replay to late subscribers.
    pub async fn cached_event(&self, id: &str) -> Option<Event> {
        self.inner.cache.get(&event_key(id)).await
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.inner.queue
    }

    pub fn publisher(&self) -> &Arc<EventPublisher> {
        &self.inner.publisher
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.inner.cache
    }

    pub fn stats(&self) -> CollectorStats {
        let inner = &self.inner;
        let c = &inner.counters;
        CollectorStats {
            cycles: CollectorCounters::get(&c.cycles),
            events_detected: CollectorCounters::get(&c.events_detected),
            events_processed: CollectorCounters::get(&c.events_processed),
            processing_errors: CollectorCounters::get(&c.processing_errors),
            source_failures: CollectorCounters::get(&c.source_failures),
            locations: inner.locations.read().len(),
            running: inner.running.load(Ordering::Acquire),
            started_at: inner.started_at,
            uptime: (inner.clock.now() - inner.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
            queue: inner.queue.stats(),
            publisher: inner.publisher.stats(),
            cache: inner.cache.stats(),
        }
    }
}

// =============================================================================
// Loops
// =============================================================================

impl Inner {
    async fn monitor_loop(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Monitoring loop started");

        loop {
            let report = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                report = self.run_cycle() => report,
            };

            let pause = if report.all_sources_failed() {
                warn!(
                    failed = report.sources_failed(),
                    "Every source failed this cycle, retrying sooner"
                );
                self.config.error_backoff
            } else {
                self.config.poll_interval
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        // Let the consumer drain what is queued and stop waiting.
        self.queue.close();
        self.running.store(false, Ordering::Release);
        info!("Monitoring loop stopped");
    }

    async fn consumer_loop(self: Arc<Self>, shutdown: CancellationToken) {
        info!(batch_size = self.config.batch_size, "Consumer loop started");

        loop {
            // Bounded by batch_timeout; returns at once on a closed queue.
            let batch = self
                .queue
                .pop_batch(self.config.batch_size, self.config.batch_timeout)
                .await;
            for event in batch {
                self.process_event(event).await;
            }

            if shutdown.is_cancelled() || (self.queue.is_closed() && self.queue.is_empty()) {
                break;
            }
        }

        let remaining = self.queue.len();
        if remaining > 0 {
            warn!(remaining, "Consumer stopped with events still queued");
        }
        info!("Consumer loop stopped");
    }

    async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let locations = self.locations.read().clone();

        let reports: Vec<LocationReport> = stream::iter(locations.into_iter())
            .map(|location| async move { self.check_location(&location).await })
            .buffer_unordered(self.config.max_concurrent_locations.max(1))
            .collect()
            .await;

        CollectorCounters::add(&self.counters.cycles, 1);
        let report = CycleReport {
            locations: reports,
            duration: started.elapsed(),
        };
        debug!(
            locations = report.locations.len(),
            enqueued = report.events_enqueued(),
            failed_sources = report.sources_failed(),
            duration_ms = report.duration.as_millis() as u64,
            "Monitoring cycle complete"
        );
        report
    }

    async fn check_location(&self, location: &WatchedLocation) -> LocationReport {
        let timeout = self.config.source_timeout;
        let mut report = LocationReport {
            location: location.name.clone(),
            ..Default::default()
        };

        let observation_calls = self.observation_sources.iter().map(|source| {
            bounded(source.name(), timeout, source.collect_observations(location))
        });
        let incident_calls = self
            .incident_sources
            .iter()
            .map(|source| bounded(source.name(), timeout, source.collect_incidents(location)));

        let (observation_results, incident_results) =
            futures::join!(join_all(observation_calls), join_all(incident_calls));

        let observations: Vec<TrafficObservation> =
            self.gather(location, observation_results, &mut report);
        let incidents: Vec<IncidentReport> = self.filter_incidents(
            location,
            self.gather(location, incident_results, &mut report),
        );
        report.observations = observations.len();
        report.incidents = incidents.len();

        let snapshot = self.fusion.fuse(&observations, &incidents);
        report.quality_score = snapshot.quality_score;

        let key = snapshot_key(&self.config.snapshot_domain, location.center);
        if !self.cache.put(&key, &snapshot, Some(self.config.snapshot_ttl)).await {
            debug!(location = %location.name, key = %key, "Snapshot not cached");
        }

        let events = self.detection.detect(location, &snapshot);
        report.events_detected = events.len();
        for event in events {
            let event_id = event.id.clone();
            if self.queue.push(event) {
                report.events_enqueued += 1;
            } else {
                warn!(location = %location.name, event_id = %event_id, "Queue refused event");
            }
        }
        CollectorCounters::add(&self.counters.events_detected, report.events_detected);

        report
    }

    // Flattens per-source results, logging and counting failures.
    fn gather<T>(
        &self,
        location: &WatchedLocation,
        results: Vec<Result<Vec<T>, SourceError>>,
        report: &mut LocationReport,
    ) -> Vec<T> {
        let mut items = Vec::new();
        for result in results {
            match result {
                Ok(batch) => {
                    report.sources_ok += 1;
                    items.extend(batch);
                }
                Err(e) => {
                    report.sources_failed += 1;
                    CollectorCounters::add(&self.counters.source_failures, 1);
                    warn!(location = %location.name, error = %e, "Source failed, excluded from fusion");
                }
            }
        }
        items
    }

    // Keeps recent incidents inside the watched radius, once per content hash.
    fn filter_incidents(&self, location: &WatchedLocation, incidents: Vec<IncidentReport>) -> Vec<IncidentReport> {
        let now = self.clock.now();
        let max_age = self.config.incident_max_age;
        let mut hashes = HashSet::new();

        incidents
            .into_iter()
            .filter(|incident| match incident.reported_at {
                // Future timestamps fail to_std and are kept.
                Some(at) => (now - at).to_std().map_or(true, |age| age <= max_age),
                None => true,
            })
            .filter(|incident| match incident.coordinates {
                Some(point) => FlatPlane::distance_km(location.center, point) <= location.radius_km,
                None => true,
            })
            .filter(|incident| incident.dedup_hash.is_empty() || hashes.insert(incident.dedup_hash.clone()))
            .collect()
    }

    async fn process_event(&self, mut event: Event) {
        let report = self.publisher.publish(&event).await;

        // Marked processed whatever the delivery outcome; never re-published.
        event.mark_processed(self.clock.now());
        self.queue.mark_processed();
        CollectorCounters::add(&self.counters.events_processed, 1);

        if !self.cache.put(&event_key(&event.id), &event, Some(self.config.event_ttl)).await {
            CollectorCounters::add(&self.counters.processing_errors, 1);
            warn!(event_id = %event.id, "Failed to cache processed event");
        }

        debug!(
            event_id = %event.id,
            event_type = %event.event_type(),
            latency_ms = event.processing_latency_ms.unwrap_or(0),
            delivered = report.transport_delivered,
            subscribers = report.subscribers_notified,
            "Event processed"
        );
    }
}

fn bounded<'a, T, F>(
    source: &'a str,
    timeout: Duration,
    call: F,
) -> impl Future<Output = Result<T, SourceError>> + 'a
where
    F: Future<Output = Result<T, SourceError>> + 'a,
    T: 'a,
{
    async move {
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                source_name: source.to_string(),
                timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BoxFuture;
    use crate::clock::ManualClock;
    use crate::events::EventType;
    use crate::geo::GeoPoint;
    use crate::model::{observation_fixture as observation, Severity};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    struct StaticSource {
        name: String,
        observations: Mutex<Vec<TrafficObservation>>,
        incidents: Mutex<Vec<IncidentReport>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl StaticSource {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                observations: Mutex::new(Vec::new()),
                incidents: Mutex::new(Vec::new()),
                delay: None,
                fail: false,
            }
        }

        async fn pause(&self) -> Result<(), SourceError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(SourceError::Unavailable {
                    source_name: self.name.clone(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    impl ObservationSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn collect_observations<'a>(
            &'a self,
            _location: &'a WatchedLocation,
        ) -> BoxFuture<'a, Result<Vec<TrafficObservation>, SourceError>> {
            Box::pin(async move {
                self.pause().await?;
                Ok(self.observations.lock().clone())
            })
        }
    }

    impl IncidentSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn collect_incidents<'a>(
            &'a self,
            _location: &'a WatchedLocation,
        ) -> BoxFuture<'a, Result<Vec<IncidentReport>, SourceError>> {
            Box::pin(async move {
                self.pause().await?;
                Ok(self.incidents.lock().clone())
            })
        }
    }

    fn west_lake() -> WatchedLocation {
        WatchedLocation::new("west_lake", GeoPoint::new(120.1551, 30.2741), 3.0)
    }

    fn config() -> CollectorConfig {
        CollectorConfig::default()
            .with_source_timeout(Duration::from_millis(100))
            .with_batch(10, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_cycle_detects_and_enqueues() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(StaticSource::new("amap"));
        source.observations.lock().push(observation(0.95, clock.now()));

        let collector = EventDrivenCollector::builder(config())
            .location(west_lake())
            .observation_source(source)
            .clock(clock)
            .build();

        let report = collector.run_cycle().await;
        assert_eq!(report.events_enqueued(), 1);
        assert_eq!(collector.queue().len(), 1);

        let snapshot = collector.latest_snapshot(&west_lake()).await.unwrap();
        assert_eq!(snapshot.congestion_ratio(), Some(0.95));
    }

    #[tokio::test]
    async fn test_failing_and_slow_sources_do_not_abort_cycle() {
        let clock = Arc::new(ManualClock::starting_now());
        let good = Arc::new(StaticSource::new("good"));
        good.observations.lock().push(observation(0.8, clock.now()));
        let mut broken = StaticSource::new("broken");
        broken.fail = true;
        let mut slow = StaticSource::new("slow");
        slow.delay = Some(Duration::from_secs(5));

        let collector = EventDrivenCollector::builder(config())
            .location(west_lake())
            .observation_source(good)
            .observation_source(Arc::new(broken))
            .incident_source(Arc::new(slow))
            .clock(clock)
            .build();

        let started = Instant::now();
        let report = collector.run_cycle().await;
        assert!(started.elapsed() < Duration::from_secs(2));

        let location = &report.locations[0];
        assert_eq!(location.sources_ok, 1);
        assert_eq!(location.sources_failed, 2);
        assert_eq!(location.events_enqueued, 1);
        assert_eq!(collector.stats().source_failures, 2);
    }

    #[tokio::test]
    async fn test_process_batch_publishes_and_caches() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(StaticSource::new("web"));
        source.incidents.lock().push(
            IncidentReport::new("i1", "Overturned truck", "lanes closed", "web").with_severity(Severity::Severe),
        );

        let collector = EventDrivenCollector::builder(config())
            .location(west_lake())
            .incident_source(source)
            .clock(clock)
            .build();
        let (tx, mut rx) = mpsc::channel(8);
        collector.subscribe(None, SubscriptionFilter::all(), SubscriptionTarget::Channel(tx));

        collector.run_cycle().await;
        assert_eq!(collector.process_batch().await, 1);

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.event_type(), EventType::Accident);
        assert_eq!(delivered.priority, Priority::Critical);

        let cached = collector.cached_event(&delivered.id).await.unwrap();
        assert!(cached.processed);
        assert!(cached.processing_latency_ms.is_some());

        let stats = collector.stats();
        assert_eq!(stats.events_processed, 1);
        assert_eq!(stats.queue.processed, 1);

        // Same incident next cycle is not re-emitted.
        collector.run_cycle().await;
        assert!(collector.queue().is_empty());
    }

    #[tokio::test]
    async fn test_incident_filtering() {
        let clock = Arc::new(ManualClock::starting_now());
        let now = clock.now();
        let source = Arc::new(StaticSource::new("web"));
        {
            let mut incidents = source.incidents.lock();
            incidents.push(IncidentReport::new("old", "Crash A", "", "web").with_reported_at(now - chrono::Duration::hours(30)));
            incidents.push(
                IncidentReport::new("far", "Crash B", "", "web").with_location("far", Some(GeoPoint::new(121.0, 31.0))),
            );
            incidents.push(IncidentReport::new("near", "Crash C", "", "web").with_reported_at(now));
            incidents.push(IncidentReport::new("near-dup", "Crash C", "", "web").with_reported_at(now));
        }

        let collector = EventDrivenCollector::builder(config())
            .location(west_lake())
            .incident_source(source)
            .clock(clock)
            .build();

        let report = collector.run_cycle().await;
        assert_eq!(report.locations[0].incidents, 1);
    }

    #[tokio::test]
    async fn test_custom_event_flows_through() {
        let collector = EventDrivenCollector::builder(config()).build();
        let id = collector
            .create_custom_event(
                "Marathon",
                "roads closed downtown",
                EventLocation::new(GeoPoint::new(120.0, 30.0), 3.0),
                serde_json::Map::new(),
                Some(Priority::High),
            )
            .unwrap();

        assert_eq!(collector.process_batch().await, 1);
        let cached = collector.cached_event(&id).await.unwrap();
        assert_eq!(cached.priority, Priority::High);
        assert_eq!(cached.source, crate::events::MANUAL_SOURCE);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(StaticSource::new("amap"));
        source.observations.lock().push(observation(0.92, clock.now()));

        let collector = EventDrivenCollector::builder(config().with_poll_interval(Duration::from_secs(60)))
            .location(west_lake())
            .observation_source(source)
            .clock(clock)
            .build();
        let (tx, mut rx) = mpsc::channel(8);
        collector.subscribe(None, SubscriptionFilter::all(), SubscriptionTarget::Channel(tx));

        let handle = collector.start(CancellationToken::new()).unwrap();
        assert!(matches!(
            collector.start(CancellationToken::new()),
            Err(CollectorError::AlreadyRunning)
        ));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event should be published")
            .unwrap();
        assert_eq!(event.event_type(), EventType::Congestion);

        tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .expect("shutdown should complete");
        assert!(!collector.stats().running);
    }
}
