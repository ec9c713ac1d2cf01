//! Carelink Core Library
//!
//! Local-first appointment lifecycle and reminder engine for a telemedicine
//! app. Screens, navigation, chat and the actual push surface live in the
//! mobile layer; this crate owns the state machine and the clock.
//!
//! # Architecture
//!
//! ```text
//! UI action ──▶ AppointmentService ──▶ AppointmentRepository ──▶ KvStore (SQLite)
//!                      │                                             ▲
//!                      ├──▶ EventBus ──▶ UI observers                │
//!                      └──▶ BackendGateway (optional mirror)         │
//!                                                                    │
//!              ReminderScheduler ◀── schedule_todays_reminders ──────┘
//!                      │
//!              ReminderEngine (worker thread)
//!                      │
//!              NotificationSink (OS notification center / banner)
//! ```
//!
//! # Core invariants
//!
//! - Only the lifecycle manager changes `status` or the reschedule
//!   negotiation; every mutation is one read-modify-write plus exactly one
//!   domain event.
//! - Reminder ids are deterministic and checked against a separately
//!   persisted fired-set: a given (appointment, offset) pair fires at most
//!   once, and never late.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Appointment, statuses, reminders)
//! - [`store`]: Key-value persistence (SQLite / in-memory)
//! - [`repository`]: Whole-collection appointment CRUD + demo bootstrap
//! - [`lifecycle`]: Status state machine and reschedule negotiation
//! - [`scheduler`]: Reminder computation, dedup and the delivery engine
//! - [`events`]: In-process pub/sub towards the UI
//! - [`backend`]: Optional remote mirror seam

pub mod backend;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod store;
pub mod timeutil;

// Re-export commonly used types
pub use backend::{BackendClient, BackendGateway};
pub use events::{DomainEvent, EventBus, EventObserver};
pub use lifecycle::{AppointmentService, LifecycleError};
pub use models::{
    Actor, Appointment, AppointmentStatus, ChangeEntry, FiredRecord, NewAppointment,
    ReminderNotification, RequestStatus, RescheduleInfo, RescheduleRequest, Role,
};
pub use repository::AppointmentRepository;
pub use scheduler::{NotificationSink, ReminderEngine, ReminderScheduler};
pub use store::{KvStore, MemoryStore, SqliteStore};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tracing::warn;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CarelinkError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No pending reschedule request: {0}")]
    NoPendingRequest(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<LifecycleError> for CarelinkError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::NotFound(id) => CarelinkError::NotFound(id),
            LifecycleError::InvalidState(msg) => CarelinkError::InvalidState(msg),
            LifecycleError::NoPendingRequest(id) => CarelinkError::NoPendingRequest(id),
            LifecycleError::InvalidInput(msg) => CarelinkError::InvalidInput(msg),
            LifecycleError::Time(e) => CarelinkError::ParseError(e.to_string()),
            LifecycleError::Store(e) => CarelinkError::StorageError(e.to_string()),
        }
    }
}

impl From<store::StoreError> for CarelinkError {
    fn from(e: store::StoreError) -> Self {
        CarelinkError::StorageError(e.to_string())
    }
}

impl From<scheduler::ScheduleError> for CarelinkError {
    fn from(e: scheduler::ScheduleError) -> Self {
        CarelinkError::StorageError(e.to_string())
    }
}

impl From<timeutil::TimeParseError> for CarelinkError {
    fn from(e: timeutil::TimeParseError) -> Self {
        CarelinkError::ParseError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create the core at the given database path, scoped to one user
/// session. `role` is `"patient"` or `"doctor"`.
#[uniffi::export]
pub fn open_core(
    path: String,
    user_id: String,
    role: String,
) -> Result<Arc<CarelinkCore>, CarelinkError> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open(&path)?);
    CarelinkCore::build(store, user_id, role)
}

/// Create a core backed by an in-memory store (for testing).
#[uniffi::export]
pub fn open_core_in_memory(
    user_id: String,
    role: String,
) -> Result<Arc<CarelinkCore>, CarelinkError> {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    CarelinkCore::build(store, user_id, role)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Session-scoped core handle for the mobile layer.
#[derive(uniffi::Object)]
pub struct CarelinkCore {
    repo: AppointmentRepository,
    service: AppointmentService,
    scheduler: Arc<ReminderScheduler>,
    bus: Arc<EventBus>,
    engine: Mutex<Option<ReminderEngine>>,
}

impl CarelinkCore {
    fn build(
        store: Arc<dyn KvStore>,
        user_id: String,
        role: String,
    ) -> Result<Arc<Self>, CarelinkError> {
        let role = Role::parse(&role)
            .ok_or_else(|| CarelinkError::InvalidInput(format!("unknown role: {}", role)))?;

        let repo = AppointmentRepository::new(Arc::clone(&store));
        repo.bootstrap_demo_data()?;

        let bus = Arc::new(EventBus::new());
        let service = AppointmentService::new(
            repo.clone(),
            Arc::clone(&bus),
            BackendGateway::local_only(),
            Actor::new(user_id, role),
        );
        let scheduler = Arc::new(ReminderScheduler::new(store));

        Ok(Arc::new(Self {
            repo,
            service,
            scheduler,
            bus,
            engine: Mutex::new(None),
        }))
    }
}

#[uniffi::export]
impl CarelinkCore {
    // =========================================================================
    // Appointment Queries
    // =========================================================================

    /// All appointments, cancelled ones included (records are never deleted).
    pub fn get_appointments(&self) -> Result<Vec<FfiAppointment>, CarelinkError> {
        Ok(self.repo.get_all()?.into_iter().map(Into::into).collect())
    }

    /// One appointment by id.
    pub fn get_appointment(&self, id: String) -> Result<Option<FfiAppointment>, CarelinkError> {
        Ok(self.repo.get(&id)?.map(Into::into))
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Create a new appointment in `pending` status.
    pub fn create_appointment(
        &self,
        input: FfiNewAppointment,
    ) -> Result<FfiAppointment, CarelinkError> {
        Ok(self.service.create_appointment(input.into())?.into())
    }

    /// Set an arbitrary status (caller-discipline entry point).
    pub fn update_status(
        &self,
        id: String,
        status: String,
        notes: Option<String>,
    ) -> Result<FfiAppointment, CarelinkError> {
        let status = AppointmentStatus::parse(&status)
            .ok_or_else(|| CarelinkError::InvalidInput(format!("unknown status: {}", status)))?;
        Ok(self
            .service
            .update_status(&id, status, notes.as_deref())?
            .into())
    }

    /// Doctor-initiated (self-approving) reschedule.
    pub fn reschedule_appointment(
        &self,
        id: String,
        new_date: String,
        new_time: String,
        reason: String,
    ) -> Result<FfiAppointment, CarelinkError> {
        Ok(self
            .service
            .reschedule_appointment(&id, &new_date, &new_time, &reason)?
            .into())
    }

    /// Patient reschedule proposal requiring doctor approval.
    pub fn create_reschedule_request(
        &self,
        id: String,
        new_date: String,
        new_time: String,
        reason: String,
    ) -> Result<FfiAppointment, CarelinkError> {
        Ok(self
            .service
            .create_reschedule_request(&id, &new_date, &new_time, &reason)?
            .into())
    }

    /// Approve or reject a pending reschedule request.
    pub fn handle_reschedule_request(
        &self,
        id: String,
        approved: bool,
        notes: Option<String>,
    ) -> Result<FfiAppointment, CarelinkError> {
        Ok(self
            .service
            .handle_reschedule_request(&id, approved, notes.as_deref())?
            .into())
    }

    /// Cancel an appointment and drop its pending reminders.
    pub fn cancel_appointment(
        &self,
        id: String,
        reason: Option<String>,
    ) -> Result<FfiAppointment, CarelinkError> {
        let cancelled = self.service.cancel_appointment(&id, reason.as_deref())?;
        self.scheduler.cancel_appointment_notifications(&id)?;
        Ok(cancelled.into())
    }

    /// Mark an appointment completed (doctor, start time passed).
    pub fn complete_appointment(
        &self,
        id: String,
        notes: Option<String>,
    ) -> Result<FfiAppointment, CarelinkError> {
        Ok(self
            .service
            .complete_appointment(&id, notes.as_deref())?
            .into())
    }

    // =========================================================================
    // Reminder Operations
    // =========================================================================

    /// (Re)compute reminders for today's active appointments. Call on load,
    /// on focus, and after any lifecycle change affecting today.
    pub fn schedule_todays_reminders(&self) -> Result<u32, CarelinkError> {
        let appointments = self.repo.get_all()?;
        Ok(self.scheduler.schedule_todays_reminders(&appointments)?)
    }

    /// Reminders currently waiting to fire.
    pub fn pending_reminders(&self) -> Result<Vec<FfiReminder>, CarelinkError> {
        Ok(self
            .scheduler
            .pending()?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Recent delivered reminders, oldest first.
    pub fn reminder_history(&self) -> Result<Vec<FfiFiredReminder>, CarelinkError> {
        Ok(self
            .scheduler
            .history()?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Start the background reminder engine delivering through `sink`.
    /// Replaces a previously running engine. The sink is also used for
    /// best-effort counterparty notifications on lifecycle changes.
    pub fn start_reminder_engine(&self, sink: Arc<dyn NotificationSink>) {
        self.service.set_notification_sink(Arc::clone(&sink));
        let engine = ReminderEngine::start(Arc::clone(&self.scheduler), sink);
        *self.engine.lock().expect("engine lock poisoned") = Some(engine);
    }

    /// Stop the background reminder engine, joining its worker.
    pub fn stop_reminder_engine(&self) {
        *self.engine.lock().expect("engine lock poisoned") = None;
    }

    // =========================================================================
    // Event Subscriptions
    // =========================================================================

    /// Observe domain events. Returns an id for [`Self::unsubscribe`].
    pub fn subscribe(&self, observer: Arc<dyn EventObserver>) -> u64 {
        self.bus.subscribe(move |event| match event.payload() {
            Ok(payload) => observer.on_event(event.name().to_string(), payload.to_string()),
            Err(error) => warn!(%error, "failed to serialize event payload"),
        })
    }

    /// Cancel an event subscription.
    pub fn unsubscribe(&self, subscription_id: u64) {
        self.bus.unsubscribe(subscription_id);
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe appointment record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub duration_minutes: u32,
    pub status: String,
    pub reason: Option<String>,
    pub reschedule_request: Option<FfiRescheduleRequest>,
    pub reschedule_info: Option<FfiRescheduleInfo>,
    pub change_history: Vec<FfiChangeEntry>,
    pub created_at: String,
    pub last_modified: String,
    pub modified_by: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            patient_id: a.patient_id,
            doctor_id: a.doctor_id,
            appointment_date: a.appointment_date,
            appointment_time: a.appointment_time,
            duration_minutes: a.duration_minutes,
            status: a.status.as_str().to_string(),
            reason: a.reason,
            reschedule_request: a.reschedule_request.map(Into::into),
            reschedule_info: a.reschedule_info.map(Into::into),
            change_history: a.change_history.into_iter().map(Into::into).collect(),
            created_at: a.created_at,
            last_modified: a.last_modified,
            modified_by: a.modified_by,
        }
    }
}

/// FFI-safe reschedule negotiation sub-record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRescheduleRequest {
    pub requested_date: String,
    pub requested_time: String,
    pub reason: String,
    pub requested_by_role: String,
    pub status: String,
    pub resolution_notes: Option<String>,
}

impl From<RescheduleRequest> for FfiRescheduleRequest {
    fn from(r: RescheduleRequest) -> Self {
        Self {
            requested_date: r.requested_date,
            requested_time: r.requested_time,
            reason: r.reason,
            requested_by_role: r.requested_by_role.as_str().to_string(),
            status: match r.status {
                RequestStatus::Pending => "pending".to_string(),
                RequestStatus::Approved => "approved".to_string(),
                RequestStatus::Rejected => "rejected".to_string(),
            },
            resolution_notes: r.resolution_notes,
        }
    }
}

/// FFI-safe record of the last applied reschedule (previous and new slot).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRescheduleInfo {
    pub previous_date: String,
    pub previous_time: String,
    pub new_date: String,
    pub new_time: String,
    pub reason: String,
    pub rescheduled_by: String,
    pub rescheduled_at: String,
}

impl From<RescheduleInfo> for FfiRescheduleInfo {
    fn from(i: RescheduleInfo) -> Self {
        Self {
            previous_date: i.previous_date,
            previous_time: i.previous_time,
            new_date: i.new_date,
            new_time: i.new_time,
            reason: i.reason,
            rescheduled_by: i.rescheduled_by,
            rescheduled_at: i.rescheduled_at,
        }
    }
}

/// FFI-safe history entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChangeEntry {
    pub action: String,
    pub timestamp: String,
    pub by_id: String,
    pub role: String,
    pub details: String,
}

impl From<ChangeEntry> for FfiChangeEntry {
    fn from(e: ChangeEntry) -> Self {
        Self {
            action: e.action,
            timestamp: e.timestamp,
            by_id: e.by_id,
            role: e.role.as_str().to_string(),
            details: e.details,
        }
    }
}

/// FFI-safe input for creating an appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub duration_minutes: u32,
    pub reason: Option<String>,
}

impl From<FfiNewAppointment> for NewAppointment {
    fn from(n: FfiNewAppointment) -> Self {
        Self {
            patient_id: n.patient_id,
            doctor_id: n.doctor_id,
            appointment_date: n.appointment_date,
            appointment_time: n.appointment_time,
            duration_minutes: n.duration_minutes,
            reason: n.reason,
        }
    }
}

/// FFI-safe pending reminder.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReminder {
    pub id: String,
    pub appointment_id: String,
    pub scheduled_time: String,
    pub title: String,
    pub message: String,
    pub offset_minutes: i64,
}

impl From<ReminderNotification> for FfiReminder {
    fn from(n: ReminderNotification) -> Self {
        Self {
            id: n.id,
            appointment_id: n.appointment_id,
            scheduled_time: n.scheduled_time,
            title: n.title,
            message: n.message,
            offset_minutes: n.offset_minutes,
        }
    }
}

/// FFI-safe delivered-reminder history entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFiredReminder {
    pub id: String,
    pub appointment_id: String,
    pub title: String,
    pub message: String,
    pub fired_at: String,
}

impl From<FiredRecord> for FfiFiredReminder {
    fn from(r: FiredRecord) -> Self {
        Self {
            id: r.id,
            appointment_id: r.appointment_id,
            title: r.title,
            message: r.message,
            fired_at: r.fired_at,
        }
    }
}
