//! Activity bus - validates change messages and republishes them in-process.
//!
//! The bus is an explicitly constructed service: build one per process (or per
//! test) and hand it to whoever needs it.
//!
//! ```text
//! RawChangeMessage ──emit──▶ catalog check ──invalid──▶ warn + drop
//!                                 │
//!                                 ▼ valid
//!                     exact-type handlers, then wildcard handlers
//! ```
//!
//! Handlers are keyed by [`EventType`], which only the catalog can mint, so a
//! registration for an untracked type cannot be expressed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::Instrument;

use crate::domain::activity::{
    ActivityEvent, EventCatalog, EventType, MalformedMessage, RawChangeMessage,
};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::ActivityHandler;

/// Handle returned by a registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// What happened to one emitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Rejected by validation; no handler ran.
    Dropped(MalformedMessage),
    /// Validated and handed to this many handlers.
    Delivered { handlers: usize },
}

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    handler: Arc<dyn ActivityHandler>,
    once: bool,
}

pub struct ActivityBus {
    catalog: Arc<EventCatalog>,
    handlers: RwLock<HashMap<EventType, Vec<Registration>>>,
    any_handlers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl ActivityBus {
    /// Creates a bus validating against `catalog`.
    pub fn new(catalog: Arc<EventCatalog>) -> Self {
        Self {
            catalog,
            handlers: RwLock::new(HashMap::new()),
            any_handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn catalog(&self) -> &Arc<EventCatalog> {
        &self.catalog
    }

    /// Registers `handler` for every event of `event_type`.
    pub fn on(&self, event_type: &EventType, handler: Arc<dyn ActivityHandler>) -> HandlerId {
        self.register(event_type, handler, false)
    }

    /// Registers `handler` for the next event of `event_type` only.
    pub fn once(&self, event_type: &EventType, handler: Arc<dyn ActivityHandler>) -> HandlerId {
        self.register(event_type, handler, true)
    }

    /// Removes a registration made with `on` or `once`.
    ///
    /// Returns `false` if it was not registered (or a `once` handler already fired).
    pub fn off(&self, event_type: &EventType, id: HandlerId) -> bool {
        let mut handlers = write(&self.handlers);
        let Some(registrations) = handlers.get_mut(event_type) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            handlers.remove(event_type);
        }
        removed
    }

    /// Registers `handler` for every catalog type.
    pub fn on_any(&self, handler: Arc<dyn ActivityHandler>) -> HandlerId {
        let id = self.next_handler_id();
        write(&self.any_handlers).push(Registration {
            id,
            handler,
            once: false,
        });
        id
    }

    /// Removes a registration made with `on_any`.
    pub fn off_any(&self, id: HandlerId) -> bool {
        let mut any = write(&self.any_handlers);
        let before = any.len();
        any.retain(|r| r.id != id);
        any.len() != before
    }

    /// Number of handlers an event of `event_type` would reach right now.
    pub fn handler_count(&self, event_type: &EventType) -> usize {
        let exact = read(&self.handlers)
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0);
        exact + read(&self.any_handlers).len()
    }

    /// Validates and republishes one change message.
    ///
    /// Invalid messages are logged at warn level and dropped without side
    /// effects. For valid messages every matching handler runs once, in
    /// registration order, exact-type handlers first. Handler failures do not
    /// stop the remaining handlers; they are collected and returned to the
    /// caller as a single `HandlerFailed` error.
    pub async fn emit(&self, raw: RawChangeMessage) -> Result<EmitOutcome, DomainError> {
        let raw_type = raw.event_type.clone();
        let event = match raw.validate(&self.catalog) {
            Ok(event) => event,
            Err(reason) => {
                tracing::warn!(
                    event_type = %raw_type,
                    error = %reason,
                    "Dropping invalid change message"
                );
                metrics::counter!("activity_bus_messages_dropped_total").increment(1);
                return Ok(EmitOutcome::Dropped(reason));
            }
        };

        let span = tracing::info_span!(
            "activity_bus.emit",
            activity_id = %event.id,
            event_type = %event.event_type,
            scope_id = event.scope_id.as_ref().map(|s| s.as_str()).unwrap_or(""),
            traceparent = event
                .trace_context
                .as_ref()
                .map(|t| t.traceparent.as_str())
                .unwrap_or(""),
        );

        self.publish(event).instrument(span).await
    }

    async fn publish(&self, event: ActivityEvent) -> Result<EmitOutcome, DomainError> {
        metrics::counter!(
            "activity_bus_messages_received_total",
            "entity_type" => event.subject.type_name().to_string()
        )
        .increment(1);

        // Snapshot handlers so no lock is held across await points
        let targets = self.take_handlers(&event.event_type);
        let event = Arc::new(event);

        let mut errors = Vec::new();
        for handler in &targets {
            if let Err(e) = handler.handle(Arc::clone(&event)).await {
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::HandlerFailed,
                format!("Handler errors: {}", errors.join(", ")),
            )
            .with_detail("activity_id", event.id.to_string()));
        }

        tracing::trace!(handlers = targets.len(), "Activity published");
        Ok(EmitOutcome::Delivered {
            handlers: targets.len(),
        })
    }

    /// Collects handlers for one event, removing one-shot registrations so
    /// they cannot fire twice even under concurrent emits.
    fn take_handlers(&self, event_type: &EventType) -> Vec<Arc<dyn ActivityHandler>> {
        let mut targets = Vec::new();
        {
            let mut handlers = write(&self.handlers);
            if let Some(registrations) = handlers.get_mut(event_type) {
                targets.extend(registrations.iter().map(|r| Arc::clone(&r.handler)));
                registrations.retain(|r| !r.once);
                if registrations.is_empty() {
                    handlers.remove(event_type);
                }
            }
        }
        targets.extend(
            read(&self.any_handlers)
                .iter()
                .map(|r| Arc::clone(&r.handler)),
        );
        targets
    }

    fn register(
        &self,
        event_type: &EventType,
        handler: Arc<dyn ActivityHandler>,
        once: bool,
    ) -> HandlerId {
        let id = self.next_handler_id();
        write(&self.handlers)
            .entry(event_type.clone())
            .or_default()
            .push(Registration { id, handler, once });
        id
    }

    fn next_handler_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

// Handlers never run under these locks, so a poisoned lock still holds a
// consistent table.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
