//! Background reminder engine.
//!
//! Instead of a fixed one-minute tick scanning the whole pending set, the
//! worker parks on a condvar until the nearest pending fire time and is woken
//! early whenever scheduling mutates the pending set. Park time is capped at
//! [`MAX_PARK`] so every fire time is observed well inside the 60-second
//! on-time window.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use super::{NotificationSink, ReminderScheduler};

/// Upper bound on how long the worker parks between checks.
const MAX_PARK: Duration = Duration::from_secs(30);

/// Pause before retrying a due-but-undelivered reminder, so a failing sink
/// does not busy-spin the worker.
const RETRY_PAUSE: Duration = Duration::from_secs(5);

struct WakerState {
    stopped: bool,
}

/// Shared wake/stop channel between the scheduler and the worker thread.
pub(crate) struct EngineWaker {
    state: Mutex<WakerState>,
    condvar: Condvar,
}

impl EngineWaker {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(WakerState { stopped: false }),
            condvar: Condvar::new(),
        }
    }

    /// Wake the worker early (the pending set changed).
    pub(crate) fn notify_change(&self) {
        self.condvar.notify_all();
    }

    fn stop(&self) {
        self.state.lock().expect("waker lock poisoned").stopped = true;
        self.condvar.notify_all();
    }

    /// Park for at most `timeout`. Returns false once stopped.
    fn park(&self, timeout: Duration) -> bool {
        let guard = self.state.lock().expect("waker lock poisoned");
        if guard.stopped {
            return false;
        }
        let (guard, _) = self
            .condvar
            .wait_timeout(guard, timeout)
            .expect("waker lock poisoned");
        !guard.stopped
    }
}

/// Owns the worker thread delivering due reminders.
///
/// Stopping (explicitly or on drop) joins the thread, so the engine never
/// outlives the owning session.
pub struct ReminderEngine {
    waker: Arc<EngineWaker>,
    handle: Option<JoinHandle<()>>,
}

impl ReminderEngine {
    /// Spawn the worker on `scheduler`, delivering through `sink`.
    pub fn start(scheduler: Arc<ReminderScheduler>, sink: Arc<dyn NotificationSink>) -> Self {
        let waker = scheduler.waker();
        let thread_waker = Arc::clone(&waker);
        let handle = std::thread::Builder::new()
            .name("carelink-reminders".into())
            .spawn(move || run(scheduler, sink, thread_waker))
            .expect("failed to spawn reminder engine");
        info!("reminder engine started");
        Self {
            waker,
            handle: Some(handle),
        }
    }

    /// Stop the worker and wait for it to exit.
    pub fn stop(&mut self) {
        self.waker.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            info!("reminder engine stopped");
        }
    }
}

impl Drop for ReminderEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(scheduler: Arc<ReminderScheduler>, sink: Arc<dyn NotificationSink>, waker: Arc<EngineWaker>) {
    loop {
        match scheduler.run_due(sink.as_ref()) {
            Ok(fired) if fired > 0 => debug!(fired, "delivered due reminders"),
            Ok(_) => {}
            Err(error) => warn!(%error, "reminder delivery pass failed"),
        }
        if let Err(error) = scheduler.cleanup_expired() {
            warn!(%error, "reminder cleanup failed");
        }

        let park_for = match scheduler.next_fire_time() {
            Ok(Some(next)) => {
                let until = next.signed_duration_since(Local::now());
                match until.to_std() {
                    Ok(until) => until.min(MAX_PARK),
                    // Next fire time already passed (delivery failed or the
                    // entry is going stale): pace the retries.
                    Err(_) => RETRY_PAUSE,
                }
            }
            Ok(None) => MAX_PARK,
            Err(error) => {
                warn!(%error, "could not read pending reminders");
                MAX_PARK
            }
        };

        if !waker.park(park_for) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::timeutil;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        delivered: AtomicUsize,
    }

    impl NotificationSink for CountingSink {
        fn deliver(&self, _title: String, _message: String, _appointment_id: String) -> bool {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_engine_fires_due_reminder() {
        let scheduler = Arc::new(ReminderScheduler::new(Arc::new(MemoryStore::new())));
        // Seed an entry whose fire time just passed, so the first delivery
        // pass finds it due.
        let reminder = crate::models::ReminderNotification {
            id: crate::models::ReminderNotification::reminder_id("apt-1", 30),
            appointment_id: "apt-1".into(),
            scheduled_time: timeutil::format_instant(
                Local::now() - ChronoDuration::seconds(5),
            ),
            title: "Appointment reminder".into(),
            message: "Your appointment starts in 30 minutes".into(),
            offset_minutes: 30,
        };
        scheduler.save_pending(&[reminder]).unwrap();
        assert_eq!(scheduler.pending().unwrap().len(), 1);

        let sink = Arc::new(CountingSink {
            delivered: AtomicUsize::new(0),
        });
        let mut engine = ReminderEngine::start(Arc::clone(&scheduler), sink.clone());

        let mut waited = 0;
        while sink.delivered.load(Ordering::SeqCst) == 0 && waited < 30 {
            std::thread::sleep(Duration::from_millis(100));
            waited += 1;
        }
        engine.stop();

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
        assert!(scheduler.pending().unwrap().is_empty());
        assert_eq!(scheduler.history().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_joins_worker() {
        let scheduler = Arc::new(ReminderScheduler::new(Arc::new(MemoryStore::new())));
        let sink = Arc::new(CountingSink {
            delivered: AtomicUsize::new(0),
        });

        let mut engine = ReminderEngine::start(scheduler, sink);
        engine.stop();
        // Second stop is a no-op.
        engine.stop();
    }
}
