//! In-process pub/sub connecting the lifecycle manager to UI observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::debug;

use crate::models::Appointment;

/// Domain events emitted by the lifecycle manager, exactly one per mutating
/// operation, always after the write succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    AppointmentCreated(Appointment),
    AppointmentUpdated(Appointment),
    AppointmentRescheduled(Appointment),
    AppointmentCancelled(Appointment),
    RescheduleRequested(Appointment),
    RescheduleHandled {
        appointment: Appointment,
        approved: bool,
    },
}

impl DomainEvent {
    /// Wire name of the event, part of the UI contract.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::AppointmentCreated(_) => "appointment_created",
            DomainEvent::AppointmentUpdated(_) => "appointment_updated",
            DomainEvent::AppointmentRescheduled(_) => "appointment_rescheduled",
            DomainEvent::AppointmentCancelled(_) => "appointment_cancelled",
            DomainEvent::RescheduleRequested(_) => "reschedule_requested",
            DomainEvent::RescheduleHandled { .. } => "reschedule_handled",
        }
    }

    /// The appointment the event is about.
    pub fn appointment(&self) -> &Appointment {
        match self {
            DomainEvent::AppointmentCreated(a)
            | DomainEvent::AppointmentUpdated(a)
            | DomainEvent::AppointmentRescheduled(a)
            | DomainEvent::AppointmentCancelled(a)
            | DomainEvent::RescheduleRequested(a)
            | DomainEvent::RescheduleHandled { appointment: a, .. } => a,
        }
    }

    /// JSON payload delivered to observers.
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            DomainEvent::RescheduleHandled {
                appointment,
                approved,
            } => Ok(json!({
                "appointment": serde_json::to_value(appointment)?,
                "approved": approved,
            })),
            other => serde_json::to_value(other.appointment()),
        }
    }
}

type Subscriber = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Minimal in-process event bus. Subscribing returns an id to unsubscribe
/// with; publishing never blocks on observer work beyond the callback itself.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; the returned id cancels it.
    pub fn subscribe<F>(&self, callback: F) -> u64
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .retain(|(sub_id, _)| *sub_id != id);
    }

    /// Deliver an event to all current subscribers.
    ///
    /// Subscribers are snapshotted before delivery so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: &DomainEvent) {
        debug!(event = event.name(), "publishing domain event");
        let snapshot: Vec<Subscriber> = self
            .subscribers
            .lock()
            .expect("event bus lock poisoned")
            .iter()
            .map(|(_, sub)| Arc::clone(sub))
            .collect();
        for subscriber in snapshot {
            subscriber(event);
        }
    }
}

/// Foreign observer surface for the UI layer.
#[uniffi::export(with_foreign)]
pub trait EventObserver: Send + Sync {
    /// Called with the event's wire name and its JSON payload.
    fn on_event(&self, name: String, payload_json: String);
}
