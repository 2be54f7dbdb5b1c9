//! Event bus
//!
//! One bus per session. Handlers run on the thread that publishes, in the
//! order they subscribed; async consumers poll a broadcast receiver.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{AppEvent, EventCategory};

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0.simple().to_string();
        write!(f, "sub-{}", &id[..8])
    }
}

/// Which events a subscription receives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event
    #[default]
    All,
    /// Only events in one of the listed categories
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Filter for a single category
    pub fn only(category: EventCategory) -> Self {
        EventFilter::Categories(vec![category])
    }

    /// Whether `event` passes this filter
    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

/// Bus tuning
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Events buffered per broadcast receiver before it lags
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Publish failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventBusError {
    /// Nobody saw the event
    #[error("No active subscribers")]
    NoSubscribers,
}

type Handler = Arc<dyn Fn(AppEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: Handler,
}

/// Synchronous, ordered publish/subscribe
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    broadcast: broadcast::Sender<AppEvent>,
    config: EventBusConfig,
}

impl EventBus {
    /// Bus with the default channel capacity
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Bus with explicit tuning
    pub fn with_config(config: EventBusConfig) -> Self {
        let (broadcast, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            subscriptions: RwLock::new(Vec::new()),
            broadcast,
            config,
        }
    }

    /// Deliver `event` to every matching handler, then to broadcast receivers
    ///
    /// Returns how many handlers and receivers saw it. Handlers are
    /// snapshotted first, so one may publish or subscribe re-entrantly; a
    /// subscription added during delivery sees only later events.
    pub fn publish(&self, event: AppEvent) -> Result<usize, EventBusError> {
        let handlers: Vec<Handler> = {
            let subscriptions = self.subscriptions.read();
            subscriptions
                .iter()
                .filter(|s| s.filter.matches(&event))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        for handler in &handlers {
            handler(event.clone());
        }

        let receivers = self.broadcast.send(event).unwrap_or(0);
        match handlers.len() + receivers {
            0 => Err(EventBusError::NoSubscribers),
            delivered => Ok(delivered),
        }
    }

    /// Register a handler; it must not block
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Arc::new(handler),
        });
        tracing::debug!("Subscribed {}", id);
        id
    }

    /// Receiver for async consumers; sees events published after this call
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.broadcast.subscribe()
    }

    /// Drop a subscription, false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(index) = subscriptions.iter().position(|s| s.id == id) else {
            return false;
        };
        subscriptions.remove(index);
        tracing::debug!("Unsubscribed {}", id);
        true
    }

    /// Number of registered handlers, broadcast receivers excluded
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Tuning the bus was built with
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriber_count())
            .field("receivers", &self.broadcast.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::events::{DeviceStatusEvent, JobStatusEvent};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus, filter: EventFilter) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        bus.subscribe(filter, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn test_unsubscribe_once() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_counts_handlers_and_receivers() {
        let bus = EventBus::new();
        assert!(matches!(
            bus.publish(AppEvent::Job(JobStatusEvent::Started)),
            Err(EventBusError::NoSubscribers)
        ));

        let hits = counter(&bus, EventFilter::All);
        let _rx = bus.receiver();
        assert_eq!(bus.publish(AppEvent::Device(DeviceStatusEvent::Changed)).ok(), Some(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            bus.subscribe(EventFilter::All, move |_| order.lock().push(i));
        }

        let _ = bus.publish(AppEvent::Job(JobStatusEvent::Paused));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_category_filter() {
        let bus = EventBus::new();
        let device = counter(&bus, EventFilter::only(EventCategory::Device));
        let job = counter(&bus, EventFilter::only(EventCategory::Job));

        let _ = bus.publish(AppEvent::Device(DeviceStatusEvent::Failure));
        let _ = bus.publish(AppEvent::Job(JobStatusEvent::Cancelled));
        let _ = bus.publish(AppEvent::Job(JobStatusEvent::Completed));

        assert_eq!(device.load(Ordering::SeqCst), 1);
        assert_eq!(job.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_publishes_follow_up() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.subscribe(EventFilter::only(EventCategory::Device), move |_| {
            let _ = inner.publish(AppEvent::Job(JobStatusEvent::Cancelled));
        });
        let jobs = counter(&bus, EventFilter::only(EventCategory::Job));

        let _ = bus.publish(AppEvent::Device(DeviceStatusEvent::Failure));
        assert_eq!(jobs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_receiver_sees_later_events() {
        let bus = EventBus::new();
        let mut rx = bus.receiver();
        let _ = bus.publish(AppEvent::Job(JobStatusEvent::FileSelected));
        assert_eq!(
            rx.recv().await.ok(),
            Some(AppEvent::Job(JobStatusEvent::FileSelected))
        );
    }
}
