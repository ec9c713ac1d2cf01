//! Appointment records and the status/role sum types.

use serde::{Deserialize, Serialize};

use crate::timeutil::{self, TimeResult};
use chrono::{DateTime, Local};

/// Appointment status.
///
/// Serialized form is the canonical snake_case string
/// (`"reschedule_requested"`, ...) that the UI and stored blobs use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Created by a patient, awaiting doctor acceptance
    Pending,
    /// Confirmed by the doctor (also the result of a doctor reschedule)
    Confirmed,
    /// Accepted and on the calendar
    Scheduled,
    /// Patient reschedule request approved
    Rescheduled,
    /// Patient reschedule request awaiting the doctor
    RescheduleRequested,
    /// Terminal: cancelled by either party (records are never deleted)
    Cancelled,
    /// Terminal: completed by the doctor after the start time passed
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::RescheduleRequested => "reschedule_requested",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "rescheduled" => Some(AppointmentStatus::Rescheduled),
            "reschedule_requested" => Some(AppointmentStatus::RescheduleRequested),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "completed" => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }

    /// Statuses that represent a live booking on the calendar. Only these
    /// receive reminders and may be rescheduled, cancelled or completed.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::Rescheduled
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::Completed
        )
    }
}

/// Party acting on an appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "patient" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            _ => None,
        }
    }
}

/// The acting user for a session-scoped service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Resolution state of a patient reschedule request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A patient-initiated proposal for a new date/time, awaiting the doctor.
///
/// Present on the record only while a negotiation is open or was just
/// resolved; the appointment's own date/time stay untouched until approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleRequest {
    pub requested_date: String,
    pub requested_time: String,
    pub reason: String,
    pub requested_by_role: Role,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

/// Audit block recorded on a doctor-initiated reschedule. Distinct from
/// [`RescheduleRequest`]: doctor reschedules are self-approving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleInfo {
    pub previous_date: String,
    pub previous_time: String,
    pub new_date: String,
    pub new_time: String,
    pub reason: String,
    pub rescheduled_by: String,
    pub rescheduled_at: String,
}

/// One append-only history entry. Entries are never altered after the fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEntry {
    pub action: String,
    pub timestamp: String,
    pub by_id: String,
    pub role: Role,
    pub details: String,
}

/// Input for creating a new appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A booked appointment between one patient and one doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Unique id
    pub id: String,
    /// Patient reference (no ownership)
    pub patient_id: String,
    /// Doctor reference (no ownership)
    pub doctor_id: String,
    /// Calendar date, canonical `YYYY-MM-DD`
    pub appointment_date: String,
    /// Start time, 12h (`10:00 AM`) or 24h (`14:30`)
    pub appointment_time: String,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Open or just-resolved patient reschedule negotiation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_request: Option<RescheduleRequest>,
    /// Audit block for the most recent doctor reschedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_info: Option<RescheduleInfo>,
    /// Append-only change log
    #[serde(default)]
    pub change_history: Vec<ChangeEntry>,
    pub created_at: String,
    pub last_modified: String,
    pub modified_by: String,
}

impl Appointment {
    /// Create a new appointment in `pending` status with a creation entry in
    /// its history.
    pub fn new(input: NewAppointment, actor: &Actor) -> Self {
        let now = timeutil::format_instant(Local::now());
        let mut appointment = Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: input.patient_id,
            doctor_id: input.doctor_id,
            appointment_date: input.appointment_date,
            appointment_time: input.appointment_time,
            duration_minutes: input.duration_minutes,
            status: AppointmentStatus::Pending,
            reason: input.reason,
            reschedule_request: None,
            reschedule_info: None,
            change_history: Vec::new(),
            created_at: now.clone(),
            last_modified: now,
            modified_by: actor.id.clone(),
        };
        appointment.record(actor, "created", "Appointment requested");
        appointment
    }

    /// Append a history entry and touch `last_modified`/`modified_by`.
    pub fn record(&mut self, actor: &Actor, action: &str, details: impl Into<String>) {
        let now = timeutil::format_instant(Local::now());
        self.change_history.push(ChangeEntry {
            action: action.to_string(),
            timestamp: now.clone(),
            by_id: actor.id.clone(),
            role: actor.role,
            details: details.into(),
        });
        self.last_modified = now;
        self.modified_by = actor.id.clone();
    }

    /// The local instant this appointment starts at.
    pub fn start_instant(&self) -> TimeResult<DateTime<Local>> {
        timeutil::local_instant(&self.appointment_date, &self.appointment_time)
    }

    /// Whether the appointment falls on the same local day as `now`.
    pub fn is_on_day_of(&self, now: DateTime<Local>) -> TimeResult<bool> {
        timeutil::is_same_local_day(&self.appointment_date, now)
    }

    /// The counterparty to `role` on this appointment.
    pub fn counterparty_of(&self, role: Role) -> &str {
        match role {
            Role::Patient => &self.doctor_id,
            Role::Doctor => &self.patient_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_appointment() -> Appointment {
        let actor = Actor::new("patient-1", Role::Patient);
        Appointment::new(
            NewAppointment {
                patient_id: "patient-1".into(),
                doctor_id: "doctor-1".into(),
                appointment_date: "2025-06-20".into(),
                appointment_time: "10:00 AM".into(),
                duration_minutes: 30,
                reason: Some("checkup".into()),
            },
            &actor,
        )
    }

    #[test]
    fn test_new_appointment_is_pending_with_history() {
        let appointment = make_appointment();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.change_history.len(), 1);
        assert_eq!(appointment.change_history[0].action, "created");
        assert_eq!(appointment.id.len(), 36);
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::RescheduleRequested,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("archived"), None);
    }

    #[test]
    fn test_status_serde_uses_canonical_strings() {
        let json = serde_json::to_string(&AppointmentStatus::RescheduleRequested).unwrap();
        assert_eq!(json, "\"reschedule_requested\"");
    }

    #[test]
    fn test_record_appends_and_touches() {
        let mut appointment = make_appointment();
        let before = appointment.change_history.len();
        let doctor = Actor::new("doctor-1", Role::Doctor);

        appointment.record(&doctor, "status_changed", "accepted");

        assert_eq!(appointment.change_history.len(), before + 1);
        assert_eq!(appointment.modified_by, "doctor-1");
        assert_eq!(appointment.change_history.last().unwrap().role, Role::Doctor);
    }

    #[test]
    fn test_counterparty() {
        let appointment = make_appointment();
        assert_eq!(appointment.counterparty_of(Role::Patient), "doctor-1");
        assert_eq!(appointment.counterparty_of(Role::Doctor), "patient-1");
    }

    #[test]
    fn test_active_and_terminal() {
        assert!(AppointmentStatus::Scheduled.is_active());
        assert!(AppointmentStatus::Rescheduled.is_active());
        assert!(!AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
    }
}
