//! Reminder notification records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::timeutil::{self, TimeResult};

/// A reminder waiting to fire.
///
/// The id is deterministic (`appt:{appointment_id}:{offset_minutes}`), so a
/// given (appointment, offset) pair can never produce two distinct entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderNotification {
    pub id: String,
    pub appointment_id: String,
    /// Absolute fire instant, RFC 3339
    pub scheduled_time: String,
    pub title: String,
    pub message: String,
    pub offset_minutes: i64,
}

impl ReminderNotification {
    /// Deterministic id for an (appointment, offset) pair.
    pub fn reminder_id(appointment_id: &str, offset_minutes: i64) -> String {
        format!("appt:{}:{}", appointment_id, offset_minutes)
    }

    pub fn fire_time(&self) -> TimeResult<DateTime<Local>> {
        timeutil::parse_instant(&self.scheduled_time)
    }
}

/// History entry for a delivered reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiredRecord {
    pub id: String,
    pub appointment_id: String,
    pub title: String,
    pub message: String,
    pub fired_at: String,
}
