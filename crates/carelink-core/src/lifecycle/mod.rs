//! Appointment lifecycle manager.
//!
//! The only component allowed to change an appointment's `status` or its
//! reschedule negotiation. Every operation is one read-modify-write against
//! the repository: load the record, validate the transition, mutate, append
//! history, write back, then emit exactly one domain event. The counterparty
//! notification afterwards is best-effort and never fails the transition.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::warn;

use crate::backend::BackendGateway;
use crate::events::{DomainEvent, EventBus};
use crate::models::{
    Actor, Appointment, AppointmentStatus, NewAppointment, RequestStatus, RescheduleInfo,
    RescheduleRequest, Role,
};
use crate::repository::AppointmentRepository;
use crate::scheduler::NotificationSink;
use crate::store::StoreError;
use crate::timeutil::{self, TimeParseError};
use chrono::{DateTime, Local};

/// Lifecycle operation errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No pending reschedule request for appointment {0}")]
    NoPendingRequest(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Date/time parse error: {0}")]
    Time(#[from] TimeParseError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Session-scoped lifecycle manager acting on behalf of one user.
///
/// Constructed per session with the acting user; there is no module-level
/// mutable "current user".
pub struct AppointmentService {
    repo: AppointmentRepository,
    bus: Arc<EventBus>,
    gateway: BackendGateway,
    sink: Mutex<Option<Arc<dyn NotificationSink>>>,
    actor: Actor,
}

impl AppointmentService {
    pub fn new(
        repo: AppointmentRepository,
        bus: Arc<EventBus>,
        gateway: BackendGateway,
        actor: Actor,
    ) -> Self {
        Self {
            repo,
            bus,
            gateway,
            sink: Mutex::new(None),
            actor,
        }
    }

    /// Attach the delivery surface used for counterparty notifications.
    pub fn set_notification_sink(&self, sink: Arc<dyn NotificationSink>) {
        *self.sink.lock().expect("sink lock poisoned") = Some(sink);
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Create a new appointment in `pending` status.
    pub fn create_appointment(&self, mut input: NewAppointment) -> LifecycleResult<Appointment> {
        if input.appointment_date.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "appointment_date is required".into(),
            ));
        }
        if input.appointment_time.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "appointment_time is required".into(),
            ));
        }
        input.appointment_date = timeutil::normalize_date(&input.appointment_date)?;
        timeutil::parse_clock_time(&input.appointment_time)?;

        let appointment = Appointment::new(input, &self.actor);
        self.repo.insert(&appointment)?;

        self.gateway
            .mirror("create_appointment", |c| c.create_appointment(&appointment));
        self.bus
            .publish(&DomainEvent::AppointmentCreated(appointment.clone()));
        self.notify_counterparty(&appointment, "A new appointment was requested");
        Ok(appointment)
    }

    /// Set an arbitrary target status.
    ///
    /// Deliberately does not check state-machine legality: the dedicated
    /// operations below carry the guarded transitions, and existing callers
    /// rely on this entry point accepting any target. History is still
    /// appended and timestamps still advance.
    pub fn update_status(
        &self,
        id: &str,
        new_status: AppointmentStatus,
        notes: Option<&str>,
    ) -> LifecycleResult<Appointment> {
        let updated = self.modify(id, |appointment| {
            appointment.status = new_status;
            let details = match notes {
                Some(notes) => format!("Status set to {} ({})", new_status.as_str(), notes),
                None => format!("Status set to {}", new_status.as_str()),
            };
            appointment.record(&self.actor, "status_changed", details);
            Ok(())
        })?;

        self.gateway.mirror("update_status", |c| {
            c.update_status(id, new_status, notes)
        });
        self.bus
            .publish(&DomainEvent::AppointmentUpdated(updated.clone()));
        self.notify_counterparty(&updated, "The appointment status changed");
        Ok(updated)
    }

    /// Doctor-initiated reschedule. Self-approving: the appointment moves to
    /// `confirmed` with its date/time replaced, and the previous slot is
    /// preserved in a [`RescheduleInfo`] audit block.
    pub fn reschedule_appointment(
        &self,
        id: &str,
        new_date: &str,
        new_time: &str,
        reason: &str,
    ) -> LifecycleResult<Appointment> {
        self.require_role(Role::Doctor, "reschedule_appointment")?;
        // Callers sometimes hand over a full ISO instant; keep the stored
        // date canonical either way.
        let new_date = timeutil::normalize_date(new_date)?;
        timeutil::parse_clock_time(new_time)?;

        let updated = self.modify(id, |appointment| {
            match appointment.status {
                AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::Rescheduled => {}
                AppointmentStatus::Pending
                | AppointmentStatus::RescheduleRequested
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Completed => {
                    return Err(LifecycleError::InvalidState(format!(
                        "cannot reschedule a {} appointment",
                        appointment.status.as_str()
                    )));
                }
            }

            appointment.reschedule_info = Some(RescheduleInfo {
                previous_date: appointment.appointment_date.clone(),
                previous_time: appointment.appointment_time.clone(),
                new_date: new_date.clone(),
                new_time: new_time.to_string(),
                reason: reason.to_string(),
                rescheduled_by: self.actor.id.clone(),
                rescheduled_at: timeutil::format_instant(Local::now()),
            });
            appointment.appointment_date = new_date.clone();
            appointment.appointment_time = new_time.to_string();
            appointment.status = AppointmentStatus::Confirmed;
            appointment.record(
                &self.actor,
                "rescheduled",
                format!("Moved to {} {} ({})", new_date, new_time, reason),
            );
            Ok(())
        })?;

        self.gateway.mirror("reschedule", |c| {
            c.reschedule(id, &updated.appointment_date, &updated.appointment_time)
        });
        self.bus
            .publish(&DomainEvent::AppointmentRescheduled(updated.clone()));
        self.notify_counterparty(&updated, "Your appointment was rescheduled by the doctor");
        Ok(updated)
    }

    /// Patient-initiated reschedule proposal. The appointment's own
    /// date/time stay untouched until the doctor approves.
    pub fn create_reschedule_request(
        &self,
        id: &str,
        new_date: &str,
        new_time: &str,
        reason: &str,
    ) -> LifecycleResult<Appointment> {
        self.require_role(Role::Patient, "create_reschedule_request")?;
        let new_date = timeutil::normalize_date(new_date)?;
        timeutil::parse_clock_time(new_time)?;

        let updated = self.modify(id, |appointment| {
            match appointment.status {
                AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::Rescheduled => {}
                AppointmentStatus::Pending
                | AppointmentStatus::RescheduleRequested
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Completed => {
                    return Err(LifecycleError::InvalidState(format!(
                        "cannot request a reschedule for a {} appointment",
                        appointment.status.as_str()
                    )));
                }
            }

            appointment.reschedule_request = Some(RescheduleRequest {
                requested_date: new_date.clone(),
                requested_time: new_time.to_string(),
                reason: reason.to_string(),
                requested_by_role: self.actor.role,
                status: RequestStatus::Pending,
                resolution_notes: None,
            });
            appointment.status = AppointmentStatus::RescheduleRequested;
            appointment.record(
                &self.actor,
                "reschedule_requested",
                format!("Requested {} {} ({})", new_date, new_time, reason),
            );
            Ok(())
        })?;

        self.gateway.mirror("update_status", |c| {
            c.update_status(id, AppointmentStatus::RescheduleRequested, Some(reason))
        });
        self.bus
            .publish(&DomainEvent::RescheduleRequested(updated.clone()));
        self.notify_counterparty(&updated, "The patient requested a reschedule");
        Ok(updated)
    }

    /// Resolve a pending patient reschedule request.
    ///
    /// Approval copies the requested date/time onto the appointment and
    /// moves it to `rescheduled`. Rejection restores the prior status; the
    /// record does not store what that was, so `confirmed` is the documented
    /// lossy default.
    pub fn handle_reschedule_request(
        &self,
        id: &str,
        approved: bool,
        notes: Option<&str>,
    ) -> LifecycleResult<Appointment> {
        self.require_role(Role::Doctor, "handle_reschedule_request")?;

        let updated = self.modify(id, |appointment| {
            let request = match appointment.reschedule_request.as_mut() {
                Some(request) if request.status == RequestStatus::Pending => request,
                _ => return Err(LifecycleError::NoPendingRequest(appointment.id.clone())),
            };

            request.resolution_notes = notes.map(str::to_string);
            if approved {
                request.status = RequestStatus::Approved;
                let new_date = request.requested_date.clone();
                let new_time = request.requested_time.clone();
                appointment.appointment_date = new_date.clone();
                appointment.appointment_time = new_time.clone();
                appointment.status = AppointmentStatus::Rescheduled;
                appointment.record(
                    &self.actor,
                    "reschedule_approved",
                    format!("Approved move to {} {}", new_date, new_time),
                );
            } else {
                request.status = RequestStatus::Rejected;
                appointment.status = AppointmentStatus::Confirmed;
                appointment.record(
                    &self.actor,
                    "reschedule_rejected",
                    notes.unwrap_or("Request rejected").to_string(),
                );
            }
            Ok(())
        })?;

        if approved {
            self.gateway.mirror("reschedule", |c| {
                c.reschedule(id, &updated.appointment_date, &updated.appointment_time)
            });
        } else {
            self.gateway.mirror("update_status", |c| {
                c.update_status(id, AppointmentStatus::Confirmed, notes)
            });
        }
        self.bus.publish(&DomainEvent::RescheduleHandled {
            appointment: updated.clone(),
            approved,
        });
        let summary = if approved {
            "Your reschedule request was approved"
        } else {
            "Your reschedule request was rejected"
        };
        self.notify_counterparty(&updated, summary);
        Ok(updated)
    }

    /// Cancel an appointment. Records are never deleted, only marked.
    ///
    /// Cancelling an already-cancelled appointment is allowed and simply
    /// appends another history entry.
    pub fn cancel_appointment(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> LifecycleResult<Appointment> {
        let updated = self.modify(id, |appointment| {
            if appointment.status == AppointmentStatus::Completed {
                return Err(LifecycleError::InvalidState(
                    "a completed appointment cannot be cancelled".into(),
                ));
            }
            appointment.status = AppointmentStatus::Cancelled;
            appointment.record(
                &self.actor,
                "cancelled",
                reason.unwrap_or("Cancelled").to_string(),
            );
            Ok(())
        })?;

        self.gateway.mirror("cancel", |c| c.cancel(id, reason));
        self.bus
            .publish(&DomainEvent::AppointmentCancelled(updated.clone()));
        self.notify_counterparty(&updated, "The appointment was cancelled");
        Ok(updated)
    }

    /// Mark an appointment completed. Doctor only, and only once its start
    /// time has passed.
    pub fn complete_appointment(
        &self,
        id: &str,
        notes: Option<&str>,
    ) -> LifecycleResult<Appointment> {
        self.complete_appointment_at(id, notes, Local::now())
    }

    pub fn complete_appointment_at(
        &self,
        id: &str,
        notes: Option<&str>,
        now: DateTime<Local>,
    ) -> LifecycleResult<Appointment> {
        self.require_role(Role::Doctor, "complete_appointment")?;

        let updated = self.modify(id, |appointment| {
            match appointment.status {
                AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::Rescheduled => {}
                AppointmentStatus::Pending
                | AppointmentStatus::RescheduleRequested
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Completed => {
                    return Err(LifecycleError::InvalidState(format!(
                        "cannot complete a {} appointment",
                        appointment.status.as_str()
                    )));
                }
            }
            if appointment.start_instant()? > now {
                return Err(LifecycleError::InvalidState(
                    "appointment time has not passed yet".into(),
                ));
            }

            appointment.status = AppointmentStatus::Completed;
            appointment.record(
                &self.actor,
                "completed",
                notes.unwrap_or("Completed").to_string(),
            );
            Ok(())
        })?;

        self.gateway.mirror("update_status", |c| {
            c.update_status(id, AppointmentStatus::Completed, notes)
        });
        self.bus
            .publish(&DomainEvent::AppointmentUpdated(updated.clone()));
        self.notify_counterparty(&updated, "The appointment was marked completed");
        Ok(updated)
    }

    /// One read-modify-write with NotFound mapping.
    fn modify<F>(&self, id: &str, f: F) -> LifecycleResult<Appointment>
    where
        F: FnOnce(&mut Appointment) -> LifecycleResult<()>,
    {
        self.repo
            .read_modify_write(id, f)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    fn require_role(&self, role: Role, operation: &str) -> LifecycleResult<()> {
        if self.actor.role == role {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState(format!(
                "{} requires the {} role",
                operation,
                role.as_str()
            )))
        }
    }

    /// Best-effort notification to the other party. Failure is logged and
    /// never propagated.
    fn notify_counterparty(&self, appointment: &Appointment, summary: &str) {
        let sink = self.sink.lock().expect("sink lock poisoned").clone();
        if let Some(sink) = sink {
            let message = format!(
                "{}: {} {}",
                summary, appointment.appointment_date, appointment.appointment_time
            );
            let delivered = sink.deliver(
                "Appointment update".to_string(),
                message,
                appointment.id.clone(),
            );
            if !delivered {
                warn!(
                    appointment_id = %appointment.id,
                    counterparty = %appointment.counterparty_of(self.actor.role),
                    "counterparty notification failed"
                );
            }
        }
    }
}
