//! Optional remote backend seam.
//!
//! The concrete HTTP client lives outside this crate; here is only the trait
//! the lifecycle manager talks to and the availability gate around it. The
//! gate probes connectivity exactly once at construction: a failed probe
//! permanently downgrades the session to local-storage-only, there is no
//! per-call retry or mid-session toggling.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Appointment, AppointmentStatus};

/// Backend call errors. Transient by nature; retry policy belongs to the UI.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend rejected request: {0}")]
    Rejected(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Remote appointment API, same shapes as the local repository.
///
/// Implementations are expected to bound each request at roughly ten
/// seconds; this crate never waits on an unbounded call.
pub trait BackendClient: Send + Sync {
    /// One-shot connectivity probe used at session start.
    fn probe(&self) -> bool;

    fn create_appointment(&self, appointment: &Appointment) -> BackendResult<()>;
    fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
        notes: Option<&str>,
    ) -> BackendResult<()>;
    fn reschedule(&self, id: &str, new_date: &str, new_time: &str) -> BackendResult<()>;
    fn cancel(&self, id: &str, reason: Option<&str>) -> BackendResult<()>;
    fn get_appointments(&self) -> BackendResult<Vec<Appointment>>;
}

/// Availability gate over an optional [`BackendClient`].
///
/// The local store stays authoritative for this core (reminders are computed
/// from it); when the backend is reachable every mutation is mirrored to it
/// best-effort. A failed mirror is logged and never fails the local
/// transition.
#[derive(Clone)]
pub struct BackendGateway {
    client: Option<Arc<dyn BackendClient>>,
}

impl BackendGateway {
    /// Probe once and keep the client only if it answered.
    pub fn probe(client: Option<Arc<dyn BackendClient>>) -> Self {
        let client = match client {
            Some(client) if client.probe() => {
                info!("backend reachable, mirroring enabled");
                Some(client)
            }
            Some(_) => {
                info!("backend probe failed, session is local-only");
                None
            }
            None => None,
        };
        Self { client }
    }

    /// A gateway with no backend at all.
    pub fn local_only() -> Self {
        Self { client: None }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// Run a backend call best-effort, logging any failure.
    pub fn mirror<F>(&self, operation: &'static str, call: F)
    where
        F: FnOnce(&dyn BackendClient) -> BackendResult<()>,
    {
        if let Some(client) = &self.client {
            if let Err(error) = call(client.as_ref()) {
                warn!(operation, %error, "backend mirror failed, continuing locally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        reachable: bool,
        calls: AtomicUsize,
    }

    impl BackendClient for StubBackend {
        fn probe(&self) -> bool {
            self.reachable
        }

        fn create_appointment(&self, _: &Appointment) -> BackendResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn update_status(
            &self,
            _: &str,
            _: AppointmentStatus,
            _: Option<&str>,
        ) -> BackendResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Unreachable("timeout".into()))
        }

        fn reschedule(&self, _: &str, _: &str, _: &str) -> BackendResult<()> {
            Ok(())
        }

        fn cancel(&self, _: &str, _: Option<&str>) -> BackendResult<()> {
            Ok(())
        }

        fn get_appointments(&self) -> BackendResult<Vec<Appointment>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_failed_probe_downgrades_permanently() {
        let backend = Arc::new(StubBackend {
            reachable: false,
            calls: AtomicUsize::new(0),
        });
        let gateway = BackendGateway::probe(Some(backend.clone()));

        assert!(!gateway.is_available());
        gateway.mirror("create", |client| {
            client.create_appointment(&unreachable_appointment())
        });
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mirror_failure_is_swallowed() {
        let backend = Arc::new(StubBackend {
            reachable: true,
            calls: AtomicUsize::new(0),
        });
        let gateway = BackendGateway::probe(Some(backend.clone()));

        assert!(gateway.is_available());
        // update_status stub always fails; mirror must not propagate it.
        gateway.mirror("update_status", |client| {
            client.update_status("id", AppointmentStatus::Scheduled, None)
        });
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    fn unreachable_appointment() -> Appointment {
        use crate::models::{Actor, NewAppointment, Role};
        Appointment::new(
            NewAppointment {
                patient_id: "p".into(),
                doctor_id: "d".into(),
                appointment_date: "2025-06-20".into(),
                appointment_time: "10:00 AM".into(),
                duration_minutes: 30,
                reason: None,
            },
            &Actor::new("p", Role::Patient),
        )
    }
}
