use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    AuditRecord,
    error::Level,
    id::{EventId, RequestId, ResponseId},
    message::PayloadKind,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Topic matching every event.
pub const ALL_TOPICS: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Correlation {
    pub causation_id: Option<EventId>,
    pub request_id: Option<RequestId>,
    pub response_id: Option<ResponseId>,
    pub route: Option<String>,
    pub dom_id: Option<String>,
}

impl Correlation {
    pub fn for_request(request_id: RequestId, route: &str) -> Self {
        Self {
            request_id: Some(request_id),
            route: Some(route.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventData {
    ServerStarted { routes: usize },
    RouteAdded { url: String, signature: String },
    RequestReceived { url: String, action: String },
    RouteResolved { url: String },
    ArgumentsPrepared { call: String },
    RouteExecuted { url: String },
    PayloadVerified { payload: PayloadKind },
    PayloadRendered { payload: PayloadKind, length: usize },
    PayloadFormatted { summary: String },
    StateUpdated { changed: bool, type_name: Option<String> },
    MessagesCollected { count: usize },
    ResponseSent { status_code: u16, payload: PayloadKind },
    Audit(AuditRecord),
}

impl EventData {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventData::ServerStarted { .. } => "server.started",
            EventData::RouteAdded { .. } => "server.route_added",
            EventData::RequestReceived { .. } => "request.received",
            EventData::RouteResolved { .. } => "route.resolved",
            EventData::ArgumentsPrepared { .. } => "route.arguments",
            EventData::RouteExecuted { .. } => "route.executed",
            EventData::PayloadVerified { .. } => "payload.verified",
            EventData::PayloadRendered { .. } => "payload.rendered",
            EventData::PayloadFormatted { .. } => "payload.formatted",
            EventData::StateUpdated { .. } => "state.updated",
            EventData::MessagesCollected { .. } => "channels.collected",
            EventData::ResponseSent { .. } => "response.sent",
            EventData::Audit(record) => match record.level {
                Level::Info => "audit.info",
                Level::Warning => "audit.warning",
                Level::Error => "audit.error",
            },
        }
    }

    fn level(&self) -> Level {
        match self {
            EventData::Audit(record) => record.level,
            EventData::ResponseSent { status_code, .. } if *status_code >= 400 => Level::Error,
            _ => Level::Info,
        }
    }
}

/// Telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Assigned by the bus on publish.
    pub id: EventId,
    pub event_type: String,
    pub correlation: Correlation,
    pub source: String,
    pub level: Level,
    pub data: EventData,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(source: &str, correlation: Correlation, data: EventData) -> Self {
        Self {
            id: EventId::default(),
            event_type: data.event_type().to_string(),
            correlation,
            source: source.to_string(),
            level: data.level(),
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn matches_topic(&self, topic: &str) -> bool {
        topic == ALL_TOPICS || self.event_type.starts_with(topic)
    }
}

pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    topic: String,
    handler: EventHandler,
    filter: Option<EventFilter>,
    once: bool,
}

impl Subscription {
    fn accepts(&self, event: &Event) -> bool {
        event.matches_topic(&self.topic) && self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}

struct BusInner {
    subscriptions: Vec<Subscription>,
    queue: VecDeque<Event>,
    capacity: usize,
    next_event_id: u64,
    next_subscription_id: u64,
}

/// Publish/subscribe over dotted topics with a bounded replay queue for
/// events nobody was listening to.
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("EventBus")
            .field("subscriptions", &inner.subscriptions.len())
            .field("queued", &inner.queue.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                subscriptions: Vec::new(),
                queue: VecDeque::with_capacity(capacity),
                capacity,
                next_event_id: 1,
                next_subscription_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `event` to every matching subscriber, or queue it if there is
    /// none. Returns the id the event was stamped with.
    pub fn publish(&self, mut event: Event) -> EventId {
        let handlers = {
            let mut inner = self.lock();
            let id = EventId(inner.next_event_id);
            event.id = id;
            inner.next_event_id += 1;

            let mut handlers = Vec::new();
            inner.subscriptions.retain(|subscription| {
                if !subscription.accepts(&event) {
                    return true;
                }
                handlers.push(subscription.handler.clone());
                !subscription.once
            });

            if handlers.is_empty() {
                if inner.capacity == 0 {
                    return id;
                }
                while inner.queue.len() >= inner.capacity {
                    inner.queue.pop_front();
                }
                inner.queue.push_back(event);
                return id;
            }

            handlers
        };

        for handler in handlers {
            handler(&event);
        }
        event.id
    }

    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_with(topic, Arc::new(handler), None, false)
    }

    /// Drains queued events matching the subscription, then installs it.
    ///
    /// A `once` subscription satisfied by the queue is never installed.
    pub fn subscribe_with(
        &self,
        topic: &str,
        handler: EventHandler,
        filter: Option<EventFilter>,
        once: bool,
    ) -> SubscriptionId {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_subscription_id);
        inner.next_subscription_id += 1;

        let subscription = Subscription {
            id,
            topic: topic.to_string(),
            handler,
            filter,
            once,
        };

        let mut replay = Vec::new();
        let mut remaining = VecDeque::with_capacity(inner.queue.len());
        for event in inner.queue.drain(..) {
            if subscription.accepts(&event) && !(once && !replay.is_empty()) {
                replay.push(event);
            } else {
                remaining.push_back(event);
            }
        }
        inner.queue = remaining;

        let handler = subscription.handler.clone();
        if !(once && !replay.is_empty()) {
            inner.subscriptions.push(subscription);
        }
        drop(inner);

        for event in &replay {
            handler(event);
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|subscription| subscription.id != id);
        inner.subscriptions.len() != before
    }

    pub fn queued(&self) -> Vec<Event> {
        self.lock().queue.iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscriptions.len()
    }
}
