//! Telemetry aggregation for the debug panel.
//!
//! The monitor listens to every event on the bus and keeps the most recent
//! ones in a ring buffer. None of its handlers may ever unwind into the bus:
//! failures are logged and kept in a diagnostics list instead.

use std::{
    collections::VecDeque,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use drafter_core::{
    Event, EventBus, Level, PayloadKind, RequestId, RouteUrl, StateSnapshot, event::ALL_TOPICS,
};
use drafter_render::Buffer;
use serde::Serialize;

const MAX_DIAGNOSTICS: usize = 50;
const PANEL_EVENTS: usize = 25;

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// One line of the visit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitRecord {
    pub request_id: RequestId,
    pub url: String,
    pub call: String,
    pub status_code: u16,
    pub payload: PayloadKind,
    /// History representation of the payload.
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub events: Vec<Event>,
    pub visits: Vec<VisitRecord>,
    pub diagnostics: Vec<String>,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Default)]
struct MonitorInner {
    events: VecDeque<Event>,
    capacity: usize,
    visits: VecDeque<VisitRecord>,
    diagnostics: VecDeque<String>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
    error_count: usize,
    warning_count: usize,
}

impl MonitorInner {
    fn diagnose(&mut self, message: String) {
        tracing::error!("{message}");
        if self.diagnostics.len() >= MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(message);
    }
}

#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Mutex<MonitorInner>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Monitor")
            .field("events", &inner.events.len())
            .field("visits", &inner.visits.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Monitor {
    /// Subscribe a new monitor to every topic on `bus`.
    pub fn attach(bus: &EventBus, capacity: usize) -> Self {
        let monitor = Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                capacity,
                events: VecDeque::with_capacity(capacity),
                visits: VecDeque::with_capacity(capacity),
                ..MonitorInner::default()
            })),
        };

        let handler = monitor.clone();
        bus.subscribe(ALL_TOPICS, move |event| handler.handle(event));
        monitor
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, event: &Event) {
        let recorded = catch_unwind(AssertUnwindSafe(|| self.record(event)));
        if let Err(panic) = recorded {
            self.lock().diagnose(format!(
                "monitor failed to record event {}: {}",
                event.event_type,
                panic_message(&*panic)
            ));
        }

        let listeners: Vec<_> = self
            .lock()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();

        for (id, listener) in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                self.lock().diagnose(format!(
                    "monitor listener {id:?} failed on {}: {}",
                    event.event_type,
                    panic_message(&*panic)
                ));
            }
        }
    }

    fn record(&self, event: &Event) {
        let mut inner = self.lock();
        match event.level {
            Level::Error => inner.error_count += 1,
            Level::Warning => inner.warning_count += 1,
            Level::Info => {}
        }
        if inner.capacity == 0 {
            return;
        }
        while inner.events.len() >= inner.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(event.clone());
    }

    /// Forward every event to `listener`, e.g. a client bridge.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_listener_id);
        inner.next_listener_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(existing, _)| *existing != id);
        inner.listeners.len() != before
    }

    /// Append to the visit log, which keeps the same number of entries as the
    /// event ring buffer.
    pub fn record_visit(&self, visit: VisitRecord) {
        let mut inner = self.lock();
        if inner.capacity == 0 {
            return;
        }
        while inner.visits.len() >= inner.capacity {
            inner.visits.pop_front();
        }
        inner.visits.push_back(visit);
    }

    pub fn visits(&self) -> Vec<VisitRecord> {
        self.lock().visits.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let inner = self.lock();
        MonitorSnapshot {
            events: inner.events.iter().cloned().collect(),
            visits: inner.visits.iter().cloned().collect(),
            diagnostics: inner.diagnostics.iter().cloned().collect(),
            error_count: inner.error_count,
            warning_count: inner.warning_count,
        }
    }

    /// HTML debug panel: state, routes, visit log and recent events.
    pub fn render_panel(&self, state: Option<&StateSnapshot>, routes: &[RouteUrl]) -> String {
        let snapshot = self.snapshot();
        let mut output = Buffer::default();

        output.push_str("<div class=\"drafter-debug-panel\">");
        output.push_str("<h3>Current state</h3>");
        match state {
            Some(state) => {
                output.push_str("<pre>");
                output.push_html(state.short_type_name());
                output.push_char(' ');
                output.push_html(
                    &serde_json::to_string_pretty(&state.value)
                        .unwrap_or_else(|error| format!("<unprintable: {error}>")),
                );
                output.push_str("</pre>");
            }
            None => output.push_str("<p>No state has been set.</p>"),
        }

        output.push_str("<h3>Routes</h3><ul>");
        for route in routes {
            output.push_str("<li><a");
            output.push_attr("href", route);
            output.push_char('>');
            output.push_html(route.name());
            output.push_str("</a></li>");
        }
        output.push_str("</ul>");

        output.push_str("<h3>Visits</h3><table><thead><tr><th>#</th><th>URL</th><th>Call</th><th>Status</th></tr></thead><tbody>");
        for visit in snapshot.visits.iter().rev() {
            output.push_str("<tr><td>");
            output.push_str(&visit.request_id.to_string());
            output.push_str("</td><td>");
            output.push_html(&visit.url);
            output.push_str("</td><td><code>");
            output.push_html(&visit.call);
            output.push_str("</code></td><td>");
            output.push_str(&visit.status_code.to_string());
            output.push_str("</td></tr>");
        }
        output.push_str("</tbody></table>");

        output.push_str("<h3>Recent events</h3><ol reversed>");
        for event in snapshot.events.iter().rev().take(PANEL_EVENTS) {
            output.push_str("<li");
            output.push_attr("class", &format!("drafter-event-{}", event.level.as_str()));
            output.push_char('>');
            output.push_str(&event.timestamp.format("%H:%M:%S%.3f").to_string());
            output.push_char(' ');
            output.push_html(&event.event_type);
            output.push_str("</li>");
        }
        output.push_str("</ol>");

        output.push_str(&format!(
            "<p>{} errors, {} warnings</p>",
            snapshot.error_count, snapshot.warning_count
        ));
        output.push_str("</div>");
        output.into_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use drafter_core::{Correlation, EventData};

    use super::*;

    fn event(data: EventData) -> Event {
        Event::new("test", Correlation::default(), data)
    }

    #[test]
    fn test_ring_buffer_keeps_latest() {
        let bus = EventBus::default();
        let monitor = Monitor::attach(&bus, 2);

        for count in 0..3 {
            bus.publish(event(EventData::MessagesCollected { count }));
        }

        let events = monitor.snapshot().events;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, EventData::MessagesCollected { count: 1 });
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let bus = EventBus::default();
        let monitor = Monitor::attach(&bus, 10);
        let delivered = Arc::new(AtomicUsize::new(0));

        monitor.add_listener(|_| panic!("listener exploded"));
        let counter = delivered.clone();
        monitor.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(event(EventData::ServerStarted { routes: 1 }));

        let snapshot = monitor.snapshot();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.diagnostics.len(), 1);
        assert!(snapshot.diagnostics[0].contains("listener exploded"));
    }

    #[test]
    fn test_counts_levels() {
        let bus = EventBus::default();
        let monitor = Monitor::attach(&bus, 10);

        bus.publish(event(EventData::ResponseSent {
            status_code: 404,
            payload: PayloadKind::ErrorPage,
        }));
        bus.publish(event(EventData::ResponseSent {
            status_code: 200,
            payload: PayloadKind::Page,
        }));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.warning_count, 0);
    }

    #[test]
    fn test_removed_listener_not_called() {
        let bus = EventBus::default();
        let monitor = Monitor::attach(&bus, 10);
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = delivered.clone();
        let id = monitor.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(monitor.remove_listener(id));

        bus.publish(event(EventData::ServerStarted { routes: 0 }));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_visit_log_is_bounded() {
        let bus = EventBus::default();
        let monitor = Monitor::attach(&bus, 3);

        for id in 1..=10 {
            monitor.record_visit(VisitRecord {
                request_id: RequestId(id),
                url: "/".into(),
                call: "index(state)".into(),
                status_code: 200,
                payload: PayloadKind::Page,
                formatted: String::new(),
            });
        }

        let ids: Vec<_> = monitor.visits().iter().map(|visit| visit.request_id).collect();
        assert_eq!(ids, [RequestId(8), RequestId(9), RequestId(10)]);
        let panel = monitor.render_panel(None, &[]);
        assert_eq!(panel.matches("index(state)").count(), 3);
    }

    #[test]
    fn test_panel_lists_routes_and_state() {
        let bus = EventBus::default();
        let monitor = Monitor::attach(&bus, 10);
        let state = StateSnapshot::capture(&serde_json::json!({"balance": 120})).unwrap();

        let html = monitor.render_panel(Some(&state), &[RouteUrl::index(), RouteUrl::new("deposit")]);

        assert!(html.contains("&quot;balance&quot;: 120"));
        assert!(html.contains(r#"<a href="/deposit">deposit</a>"#));
        assert!(html.contains("0 errors, 0 warnings"));
    }
}
