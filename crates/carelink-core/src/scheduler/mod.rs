//! Reminder scheduling without a push infrastructure.
//!
//! Reminders are computed from appointment data, persisted as a pending set,
//! and delivered by the engine in `engine.rs`. Deduplication rests on two
//! pieces: deterministic reminder ids and a fired-set persisted separately
//! from the pending set, consulted before every schedule and every fire.

mod engine;

pub use engine::*;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Appointment, FiredRecord, ReminderNotification};
use crate::store::{
    KvStore, StoreError, FIRED_REMINDERS_KEY, PENDING_REMINDERS_KEY, REMINDER_HISTORY_KEY,
};
use crate::timeutil;

/// Fixed reminder offsets, minutes before the appointment start.
pub const REMINDER_OFFSETS_MINUTES: [i64; 3] = [30, 15, 5];

/// A reminder is "due" while `0 <= now - fire_time <= DUE_WINDOW_SECONDS`.
/// Bounds how late a check still counts as on time.
pub const DUE_WINDOW_SECONDS: i64 = 60;

/// Pending entries more than this far past their fire time are considered
/// undeliverable and evicted by cleanup.
pub const EXPIRY_MINUTES: i64 = 60;

/// Bounded length of the delivered-reminder history.
const HISTORY_LIMIT: usize = 100;

/// Scheduler errors. Date/time parse failures are not here on purpose:
/// they are per-record, logged and skipped, never propagated.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// External delivery surface (OS notification center or in-app banner).
///
/// Returns whether delivery happened; a `false` leaves the reminder pending
/// for the next tick.
#[uniffi::export(with_foreign)]
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, title: String, message: String, appointment_id: String) -> bool;
}

/// Computes, persists and fires appointment reminders.
///
/// The engine worker and UI calls mutate the same persisted pending set, so
/// every read-modify-write of it happens under `pending_lock`. Delivery
/// itself runs with the lock released; `run_due_at` snapshots the due
/// entries first and re-merges the outcome under the lock.
pub struct ReminderScheduler {
    store: Arc<dyn KvStore>,
    waker: Arc<EngineWaker>,
    pending_lock: Mutex<()>,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            waker: Arc::new(EngineWaker::new()),
            pending_lock: Mutex::new(()),
        }
    }

    pub(crate) fn waker(&self) -> Arc<EngineWaker> {
        Arc::clone(&self.waker)
    }

    /// Schedule one reminder `offset_minutes` before the appointment start.
    ///
    /// Returns the reminder id, or `None` (not an error) when the fire time
    /// is already past, the reminder has already fired this lifetime, or the
    /// appointment's date/time cannot be parsed. Scheduling the same
    /// (appointment, offset) twice is a no-op returning the same id.
    pub fn schedule_reminder(
        &self,
        appointment: &Appointment,
        offset_minutes: i64,
    ) -> ScheduleResult<Option<String>> {
        self.schedule_reminder_at(appointment, offset_minutes, Local::now())
    }

    pub fn schedule_reminder_at(
        &self,
        appointment: &Appointment,
        offset_minutes: i64,
        now: DateTime<Local>,
    ) -> ScheduleResult<Option<String>> {
        let start = match appointment.start_instant() {
            Ok(start) => start,
            Err(error) => {
                warn!(
                    appointment_id = %appointment.id,
                    %error,
                    "skipping reminder for unparseable appointment"
                );
                return Ok(None);
            }
        };

        let fire_time = start - Duration::minutes(offset_minutes);
        if fire_time <= now {
            debug!(
                appointment_id = %appointment.id,
                offset_minutes,
                "fire time already past, not scheduling"
            );
            return Ok(None);
        }

        let id = ReminderNotification::reminder_id(&appointment.id, offset_minutes);
        let _guard = self.pending_lock.lock().expect("pending lock poisoned");
        if self.fired_ids()?.contains(&id) {
            debug!(reminder_id = %id, "already delivered, not rescheduling");
            return Ok(None);
        }

        let mut pending = self.pending()?;
        if pending.iter().any(|n| n.id == id) {
            return Ok(Some(id));
        }

        pending.push(ReminderNotification {
            id: id.clone(),
            appointment_id: appointment.id.clone(),
            scheduled_time: timeutil::format_instant(fire_time),
            title: "Appointment reminder".to_string(),
            message: format!(
                "Your appointment at {} starts in {} minutes",
                appointment.appointment_time, offset_minutes
            ),
            offset_minutes,
        });
        self.save_pending(&pending)?;
        self.waker.notify_change();
        Ok(Some(id))
    }

    /// Schedule the fixed offsets for every active appointment falling on
    /// the current local day. Per-record failures never abort the batch.
    pub fn schedule_todays_reminders(
        &self,
        appointments: &[Appointment],
    ) -> ScheduleResult<u32> {
        self.schedule_todays_reminders_at(appointments, Local::now())
    }

    pub fn schedule_todays_reminders_at(
        &self,
        appointments: &[Appointment],
        now: DateTime<Local>,
    ) -> ScheduleResult<u32> {
        let mut scheduled = 0u32;
        for appointment in appointments {
            if !appointment.status.is_active() {
                continue;
            }
            match appointment.is_on_day_of(now) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(error) => {
                    warn!(
                        appointment_id = %appointment.id,
                        %error,
                        "skipping appointment with unparseable date"
                    );
                    continue;
                }
            }
            for offset in REMINDER_OFFSETS_MINUTES {
                if self.schedule_reminder_at(appointment, offset, now)?.is_some() {
                    scheduled += 1;
                }
            }
        }
        Ok(scheduled)
    }

    /// Deliver every due reminder through `sink`.
    ///
    /// For each delivered entry the fired-set insert, the history append and
    /// the pending removal happen together; a failed delivery leaves the
    /// entry pending so the next tick retries it inside the due window.
    pub fn run_due(&self, sink: &dyn NotificationSink) -> ScheduleResult<u32> {
        self.run_due_at(sink, Local::now())
    }

    pub fn run_due_at(
        &self,
        sink: &dyn NotificationSink,
        now: DateTime<Local>,
    ) -> ScheduleResult<u32> {
        // Snapshot the due entries under the lock, dropping entries that
        // already fired under their id. Delivery runs with the lock
        // released, so a slow sink cannot stall scheduling or cancellation.
        let due = {
            let _guard = self.pending_lock.lock().expect("pending lock poisoned");
            let pending = self.pending()?;
            if pending.is_empty() {
                return Ok(0);
            }

            let fired = self.fired_ids()?;
            let before = pending.len();
            let mut due = Vec::new();
            let mut remaining = Vec::with_capacity(before);
            for notification in pending {
                let fire_time = match notification.fire_time() {
                    Ok(fire_time) => fire_time,
                    Err(error) => {
                        warn!(reminder_id = %notification.id, %error, "unparseable fire time");
                        remaining.push(notification);
                        continue;
                    }
                };

                let lateness = now.signed_duration_since(fire_time);
                let in_window = lateness >= Duration::zero()
                    && lateness <= Duration::seconds(DUE_WINDOW_SECONDS);
                if !in_window {
                    remaining.push(notification);
                } else if fired.contains(&notification.id) {
                    // Already delivered under this id; drop the duplicate.
                } else {
                    due.push(notification);
                }
            }

            if remaining.len() + due.len() < before {
                let mut kept = remaining;
                kept.extend(due.iter().cloned());
                self.save_pending(&kept)?;
            }
            due
        };

        let mut delivered = Vec::new();
        for notification in &due {
            let ok = sink.deliver(
                notification.title.clone(),
                notification.message.clone(),
                notification.appointment_id.clone(),
            );
            if ok {
                delivered.push(notification);
            } else {
                warn!(reminder_id = %notification.id, "delivery failed, will retry");
            }
        }
        if delivered.is_empty() {
            return Ok(0);
        }

        // Re-merge against a fresh read: entries scheduled or cancelled
        // while the sink ran must survive this write-back.
        let _guard = self.pending_lock.lock().expect("pending lock poisoned");
        let mut fired = self.fired_ids()?;
        let mut history = self.history()?;
        for notification in &delivered {
            fired.insert(notification.id.clone());
            history.push(FiredRecord {
                id: notification.id.clone(),
                appointment_id: notification.appointment_id.clone(),
                title: notification.title.clone(),
                message: notification.message.clone(),
                fired_at: timeutil::format_instant(now),
            });
        }
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
        self.save_fired(&fired)?;
        self.save_history(&history)?;

        let remaining: Vec<ReminderNotification> = self
            .pending()?
            .into_iter()
            .filter(|n| !delivered.iter().any(|d| d.id == n.id))
            .collect();
        self.save_pending(&remaining)?;
        Ok(delivered.len() as u32)
    }

    /// Remove all pending reminders for an appointment (used on cancel).
    /// Historical fires stay fired.
    pub fn cancel_appointment_notifications(&self, appointment_id: &str) -> ScheduleResult<u32> {
        let _guard = self.pending_lock.lock().expect("pending lock poisoned");
        let pending = self.pending()?;
        let before = pending.len();
        let remaining: Vec<ReminderNotification> = pending
            .into_iter()
            .filter(|n| n.appointment_id != appointment_id)
            .collect();
        let removed = (before - remaining.len()) as u32;
        if removed > 0 {
            self.save_pending(&remaining)?;
            self.waker.notify_change();
        }
        Ok(removed)
    }

    /// Evict pending entries more than [`EXPIRY_MINUTES`] past their fire
    /// time, plus entries whose stored fire time no longer parses.
    pub fn cleanup_expired(&self) -> ScheduleResult<u32> {
        self.cleanup_expired_at(Local::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Local>) -> ScheduleResult<u32> {
        let _guard = self.pending_lock.lock().expect("pending lock poisoned");
        let pending = self.pending()?;
        let before = pending.len();
        let cutoff = Duration::minutes(EXPIRY_MINUTES);
        let remaining: Vec<ReminderNotification> = pending
            .into_iter()
            .filter(|n| match n.fire_time() {
                Ok(fire_time) => now.signed_duration_since(fire_time) <= cutoff,
                Err(_) => false,
            })
            .collect();
        let evicted = (before - remaining.len()) as u32;
        if evicted > 0 {
            debug!(evicted, "evicted expired reminders");
            self.save_pending(&remaining)?;
        }
        Ok(evicted)
    }

    /// Earliest fire time among pending reminders, used by the engine to
    /// park until there is work.
    pub fn next_fire_time(&self) -> ScheduleResult<Option<DateTime<Local>>> {
        Ok(self
            .pending()?
            .iter()
            .filter_map(|n| n.fire_time().ok())
            .min())
    }

    /// Pending reminders, oldest fire time first.
    pub fn pending(&self) -> ScheduleResult<Vec<ReminderNotification>> {
        match self.store.get(PENDING_REMINDERS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StoreError::from)?),
            None => Ok(Vec::new()),
        }
    }

    /// History of delivered reminders, most recent last.
    pub fn history(&self) -> ScheduleResult<Vec<FiredRecord>> {
        match self.store.get(REMINDER_HISTORY_KEY)? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StoreError::from)?),
            None => Ok(Vec::new()),
        }
    }

    fn fired_ids(&self) -> ScheduleResult<HashSet<String>> {
        match self.store.get(FIRED_REMINDERS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StoreError::from)?),
            None => Ok(HashSet::new()),
        }
    }

    fn save_pending(&self, pending: &[ReminderNotification]) -> ScheduleResult<()> {
        self.store
            .set(
                PENDING_REMINDERS_KEY,
                serde_json::to_value(pending).map_err(StoreError::from)?,
            )
            .map_err(ScheduleError::from)
    }

    fn save_fired(&self, fired: &HashSet<String>) -> ScheduleResult<()> {
        let mut ids: Vec<&String> = fired.iter().collect();
        ids.sort();
        self.store
            .set(
                FIRED_REMINDERS_KEY,
                serde_json::to_value(ids).map_err(StoreError::from)?,
            )
            .map_err(ScheduleError::from)
    }

    fn save_history(&self, history: &[FiredRecord]) -> ScheduleResult<()> {
        self.store
            .set(
                REMINDER_HISTORY_KEY,
                serde_json::to_value(history).map_err(StoreError::from)?,
            )
            .map_err(ScheduleError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, AppointmentStatus, NewAppointment, Role};
    use crate::store::MemoryStore;
    use std::sync::mpsc;

    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
        succeed: bool,
    }

    impl RecordingSink {
        fn new(succeed: bool) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                succeed,
            }
        }

        fn count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    impl NotificationSink for RecordingSink {
        fn deliver(&self, _title: String, message: String, _appointment_id: String) -> bool {
            self.delivered.lock().unwrap().push(message);
            self.succeed
        }
    }

    fn make_appointment(date: &str, time: &str) -> Appointment {
        let mut appointment = Appointment::new(
            NewAppointment {
                patient_id: "patient-1".into(),
                doctor_id: "doctor-1".into(),
                appointment_date: date.into(),
                appointment_time: time.into(),
                duration_minutes: 30,
                reason: None,
            },
            &Actor::new("patient-1", Role::Patient),
        );
        appointment.status = AppointmentStatus::Scheduled;
        appointment
    }

    fn scheduler() -> ReminderScheduler {
        ReminderScheduler::new(Arc::new(MemoryStore::new()))
    }

    fn at(date: &str, time: &str) -> DateTime<Local> {
        timeutil::local_instant(date, time).unwrap()
    }

    #[test]
    fn test_schedule_computes_fire_time() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        let now = at("2025-06-20", "09:00");

        let id = scheduler
            .schedule_reminder_at(&appointment, 30, now)
            .unwrap()
            .unwrap();
        assert_eq!(id, format!("appt:{}:30", appointment.id));

        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].fire_time().unwrap(),
            at("2025-06-20", "09:30")
        );
    }

    #[test]
    fn test_schedule_past_due_returns_none() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        // 09:45 is after the 09:30 fire time for a 30-minute offset.
        let now = at("2025-06-20", "09:45");

        let id = scheduler.schedule_reminder_at(&appointment, 30, now).unwrap();
        assert!(id.is_none());
        assert!(scheduler.pending().unwrap().is_empty());
    }

    #[test]
    fn test_schedule_twice_is_dedup_noop_with_same_id() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        let now = at("2025-06-20", "09:00");

        let first = scheduler.schedule_reminder_at(&appointment, 30, now).unwrap();
        let second = scheduler.schedule_reminder_at(&appointment, 30, now).unwrap();
        assert_eq!(first, second);
        assert_eq!(scheduler.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_fired_reminder_is_never_rescheduled() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        let sink = RecordingSink::new(true);

        scheduler
            .schedule_reminder_at(&appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();
        let fired = scheduler
            .run_due_at(&sink, at("2025-06-20", "09:30"))
            .unwrap();
        assert_eq!(fired, 1);

        // Re-scheduling the fired (appointment, offset) is a no-op even
        // though the fire time would be computed as future at 09:00.
        let again = scheduler
            .schedule_reminder_at(&appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();
        assert!(again.is_none());
        assert!(scheduler.pending().unwrap().is_empty());
    }

    #[test]
    fn test_due_window_bounds() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        let sink = RecordingSink::new(true);
        scheduler
            .schedule_reminder_at(&appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();

        // Before the fire time: not due.
        assert_eq!(
            scheduler.run_due_at(&sink, at("2025-06-20", "09:29")).unwrap(),
            0
        );
        // More than 60s past: stale, not fired.
        assert_eq!(
            scheduler.run_due_at(&sink, at("2025-06-20", "09:32")).unwrap(),
            0
        );
        assert_eq!(sink.count(), 0);
        // Inside the window: fired.
        let inside = at("2025-06-20", "09:30") + Duration::seconds(45);
        assert_eq!(scheduler.run_due_at(&sink, inside).unwrap(), 1);
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_failed_delivery_stays_pending() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        scheduler
            .schedule_reminder_at(&appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();

        let failing = RecordingSink::new(false);
        let due = at("2025-06-20", "09:30");
        assert_eq!(scheduler.run_due_at(&failing, due).unwrap(), 0);
        assert_eq!(failing.count(), 1);
        assert_eq!(scheduler.pending().unwrap().len(), 1);
        assert!(scheduler.history().unwrap().is_empty());

        // Next tick inside the window retries and succeeds.
        let working = RecordingSink::new(true);
        let retry = due + Duration::seconds(30);
        assert_eq!(scheduler.run_due_at(&working, retry).unwrap(), 1);
        assert!(scheduler.pending().unwrap().is_empty());
        assert_eq!(scheduler.history().unwrap().len(), 1);
    }

    #[test]
    fn test_schedule_todays_reminders_filters_and_continues() {
        let scheduler = scheduler();
        let now = at("2025-06-20", "08:00");

        let today = make_appointment("2025-06-20", "10:00 AM");
        let other_day = make_appointment("2025-06-21", "10:00 AM");
        let mut cancelled = make_appointment("2025-06-20", "11:00 AM");
        cancelled.status = AppointmentStatus::Cancelled;
        let mut malformed = make_appointment("2025-06-20", "10:00 AM");
        malformed.appointment_date = "someday".into();
        let late_day = make_appointment("2025-06-20", "02:00 PM");

        let scheduled = scheduler
            .schedule_todays_reminders_at(
                &[today.clone(), other_day, cancelled, malformed, late_day.clone()],
                now,
            )
            .unwrap();

        // Both surviving appointments get all three offsets.
        assert_eq!(scheduled, 6);
        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.len(), 6);
        assert!(pending.iter().all(|n| {
            n.appointment_id == today.id || n.appointment_id == late_day.id
        }));
    }

    #[test]
    fn test_cancel_appointment_notifications_keeps_fired_set() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        let other = make_appointment("2025-06-20", "11:00 AM");
        let now = at("2025-06-20", "08:00");
        let sink = RecordingSink::new(true);

        scheduler.schedule_todays_reminders_at(&[appointment.clone(), other.clone()], now).unwrap();
        // Fire the 30-minute reminder of the first appointment.
        scheduler.run_due_at(&sink, at("2025-06-20", "09:30")).unwrap();
        assert_eq!(sink.count(), 1);

        let removed = scheduler
            .cancel_appointment_notifications(&appointment.id)
            .unwrap();
        assert_eq!(removed, 2); // the 15 and 5 minute entries

        // Other appointment untouched, fired-set untouched.
        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|n| n.appointment_id == other.id));
        let again = scheduler
            .schedule_reminder_at(&appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_cleanup_evicts_stale_entries() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        scheduler
            .schedule_reminder_at(&appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();

        // 59 minutes past the 09:30 fire time: kept.
        assert_eq!(
            scheduler.cleanup_expired_at(at("2025-06-20", "10:29")).unwrap(),
            0
        );
        // 61 minutes past: evicted.
        assert_eq!(
            scheduler.cleanup_expired_at(at("2025-06-20", "10:31")).unwrap(),
            1
        );
        assert!(scheduler.pending().unwrap().is_empty());
    }

    /// Sink that parks inside `deliver` until the test releases it, holding
    /// a delivery tick open while the test mutates the pending set.
    struct GatedSink {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedSink {
        fn new() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let sink = Self {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            };
            (sink, entered_rx, release_tx)
        }
    }

    impl NotificationSink for GatedSink {
        fn deliver(&self, _title: String, _message: String, _appointment_id: String) -> bool {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            true
        }
    }

    #[test]
    fn test_schedule_during_delivery_tick_is_not_lost() {
        let scheduler = Arc::new(scheduler());
        let first = make_appointment("2025-06-20", "10:00 AM");
        let second = make_appointment("2025-06-20", "11:00 AM");
        let now = at("2025-06-20", "09:30");
        scheduler
            .schedule_reminder_at(&first, 30, at("2025-06-20", "09:00"))
            .unwrap();

        let (sink, entered, release) = GatedSink::new();
        let tick = {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || scheduler.run_due_at(&sink, now).unwrap())
        };

        // The tick is parked inside deliver; schedule a reminder for the
        // second appointment while it is mid-flight.
        entered.recv().unwrap();
        let id = scheduler.schedule_reminder_at(&second, 30, now).unwrap();
        assert!(id.is_some());
        release.send(()).unwrap();
        assert_eq!(tick.join().unwrap(), 1);

        // The tick's write-back removes only what it delivered.
        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].appointment_id, second.id);
        assert_eq!(scheduler.history().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_during_delivery_tick_is_not_resurrected() {
        let scheduler = Arc::new(scheduler());
        let due_appointment = make_appointment("2025-06-20", "10:00 AM");
        let cancelled = make_appointment("2025-06-20", "02:00 PM");
        let now = at("2025-06-20", "09:30");
        scheduler
            .schedule_reminder_at(&due_appointment, 30, at("2025-06-20", "09:00"))
            .unwrap();
        scheduler
            .schedule_reminder_at(&cancelled, 30, at("2025-06-20", "09:00"))
            .unwrap();

        let (sink, entered, release) = GatedSink::new();
        let tick = {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || scheduler.run_due_at(&sink, now).unwrap())
        };

        entered.recv().unwrap();
        assert_eq!(
            scheduler
                .cancel_appointment_notifications(&cancelled.id)
                .unwrap(),
            1
        );
        release.send(()).unwrap();
        assert_eq!(tick.join().unwrap(), 1);

        assert!(scheduler.pending().unwrap().is_empty());
    }

    #[test]
    fn test_next_fire_time_is_earliest() {
        let scheduler = scheduler();
        let appointment = make_appointment("2025-06-20", "10:00 AM");
        let now = at("2025-06-20", "08:00");

        assert!(scheduler.next_fire_time().unwrap().is_none());
        for offset in REMINDER_OFFSETS_MINUTES {
            scheduler.schedule_reminder_at(&appointment, offset, now).unwrap();
        }
        assert_eq!(
            scheduler.next_fire_time().unwrap().unwrap(),
            at("2025-06-20", "09:30")
        );
    }
}
