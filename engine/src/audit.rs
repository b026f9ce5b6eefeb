//! Structured info/warning/error reporting tied to the request in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use drafter_core::{AuditRecord, Correlation, Event, EventBus, EventData, Level, RequestId};

struct Scope {
    request_id: RequestId,
    route: String,
    records: Vec<AuditRecord>,
}

type Stack = Arc<Mutex<Vec<Scope>>>;

fn lock(stack: &Stack) -> MutexGuard<'_, Vec<Scope>> {
    stack.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publishes audit events and attaches the current request to them.
#[derive(Clone)]
pub struct Audit {
    bus: Arc<EventBus>,
    stack: Stack,
}

/// Pops its request scope when dropped, on every exit path.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    stack: Stack,
    depth: usize,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        lock(&self.stack).truncate(self.depth);
    }
}

impl Audit {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            stack: Arc::default(),
        }
    }

    pub fn enter(&self, request_id: RequestId, route: &str) -> ScopeGuard {
        let mut stack = lock(&self.stack);
        let depth = stack.len();
        stack.push(Scope {
            request_id,
            route: route.to_string(),
            records: Vec::new(),
        });
        ScopeGuard {
            stack: self.stack.clone(),
            depth,
        }
    }

    pub fn current_request(&self) -> Option<RequestId> {
        lock(&self.stack).last().map(|scope| scope.request_id)
    }

    pub fn depth(&self) -> usize {
        lock(&self.stack).len()
    }

    /// Records collected in the innermost scope so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        lock(&self.stack)
            .last()
            .map(|scope| scope.records.clone())
            .unwrap_or_default()
    }

    pub fn info(
        &self,
        message: impl Into<String>,
        location: &str,
        details: impl Into<String>,
    ) -> AuditRecord {
        self.record(Level::Info, message.into(), location, details.into(), None)
    }

    pub fn warning(
        &self,
        message: impl Into<String>,
        location: &str,
        details: impl Into<String>,
    ) -> AuditRecord {
        self.record(Level::Warning, message.into(), location, details.into(), None)
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        location: &str,
        details: impl Into<String>,
        traceback: Option<String>,
    ) -> AuditRecord {
        self.record(
            Level::Error,
            message.into(),
            location,
            details.into(),
            traceback,
        )
    }

    fn record(
        &self,
        level: Level,
        message: String,
        location: &str,
        details: String,
        traceback: Option<String>,
    ) -> AuditRecord {
        let correlation = {
            let stack = lock(&self.stack);
            match stack.last() {
                Some(scope) => Correlation::for_request(scope.request_id, &scope.route),
                None => Correlation::default(),
            }
        };

        let record = AuditRecord {
            level,
            message,
            location: location.to_string(),
            details,
            traceback,
            request_id: correlation.request_id,
        };

        match level {
            Level::Info => tracing::info!("{}: {}", record.location, record.message),
            Level::Warning => tracing::warn!("{}: {}", record.location, record.message),
            Level::Error => tracing::error!(
                "{}: {} ({})",
                record.location,
                record.message,
                record.details
            ),
        }

        if let Some(scope) = lock(&self.stack).last_mut() {
            scope.records.push(record.clone());
        }

        self.bus.publish(Event::new(
            "audit",
            correlation,
            EventData::Audit(record.clone()),
        ));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_pops_on_drop() {
        let audit = Audit::new(Arc::new(EventBus::default()));
        {
            let _outer = audit.enter(RequestId(1), "/");
            {
                let _inner = audit.enter(RequestId(2), "/deposit");
                assert_eq!(audit.current_request(), Some(RequestId(2)));
            }
            assert_eq!(audit.current_request(), Some(RequestId(1)));
        }
        assert_eq!(audit.depth(), 0);
    }

    #[test]
    fn test_scope_pops_on_panic() {
        let audit = Audit::new(Arc::new(EventBus::default()));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = audit.enter(RequestId(7), "/boom");
            panic!("route failed");
        }));

        assert!(result.is_err());
        assert_eq!(audit.depth(), 0);
    }

    #[test]
    fn test_records_carry_request_id() {
        let bus = Arc::new(EventBus::default());
        let audit = Audit::new(bus.clone());

        let _scope = audit.enter(RequestId(3), "/deposit");
        let record = audit.warning("extra arguments", "Router.prepare_arguments", "x=1");

        assert_eq!(record.request_id, Some(RequestId(3)));
        assert_eq!(audit.records(), vec![record]);

        let queued = bus.queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].event_type, "audit.warning");
        assert_eq!(queued[0].correlation.route.as_deref(), Some("/deposit"));
    }
}
