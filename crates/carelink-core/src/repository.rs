//! Appointment repository: whole-collection CRUD over the key-value store.
//!
//! Every mutation reads the full collection, updates one entry by id and
//! writes the full collection back. Last writer wins at whole-collection
//! granularity, which is acceptable for a single-device, single-process core.

use std::sync::Arc;

use chrono::{Duration, Local};
use serde_json::Value;
use tracing::info;

use crate::models::{Actor, Appointment, AppointmentStatus, NewAppointment, Role};
use crate::store::{KvStore, StoreResult, APPOINTMENTS_KEY};
use crate::timeutil;

/// Repository over the appointment collection blob.
#[derive(Clone)]
pub struct AppointmentRepository {
    store: Arc<dyn KvStore>,
}

impl AppointmentRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Load the whole collection. An absent key is an empty collection.
    pub fn get_all(&self) -> StoreResult<Vec<Appointment>> {
        match self.store.get(APPOINTMENTS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the whole collection.
    pub fn save_all(&self, appointments: &[Appointment]) -> StoreResult<()> {
        self.store
            .set(APPOINTMENTS_KEY, serde_json::to_value(appointments)?)
    }

    /// Find one appointment by id.
    pub fn get(&self, id: &str) -> StoreResult<Option<Appointment>> {
        Ok(self.get_all()?.into_iter().find(|a| a.id == id))
    }

    /// Append a new appointment to the collection.
    pub fn insert(&self, appointment: &Appointment) -> StoreResult<()> {
        let mut all = self.get_all()?;
        all.push(appointment.clone());
        self.save_all(&all)
    }

    /// Read the collection, mutate the entry with `id` through `f`, write the
    /// collection back. Returns `None` without writing when the id is absent.
    ///
    /// No suspension happens between the read and the write, so the
    /// cooperative single-process model keeps this race-free.
    pub fn read_modify_write<E, F>(&self, id: &str, f: F) -> Result<Option<Appointment>, E>
    where
        E: From<crate::store::StoreError>,
        F: FnOnce(&mut Appointment) -> Result<(), E>,
    {
        let mut all = self.get_all()?;
        let Some(entry) = all.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        f(entry)?;
        let updated = entry.clone();
        self.save_all(&all)?;
        Ok(Some(updated))
    }

    /// Seed demo data when the stored collection is empty or structurally
    /// invalid. Never touches valid existing data. Returns whether seeding
    /// happened.
    pub fn bootstrap_demo_data(&self) -> StoreResult<bool> {
        if let Some(value) = self.store.get(APPOINTMENTS_KEY)? {
            if is_structurally_valid(&value) {
                return Ok(false);
            }
            info!("stored appointment collection is invalid, reseeding");
        }
        let demo = demo_appointments();
        self.save_all(&demo)?;
        info!(count = demo.len(), "seeded demo appointments");
        Ok(true)
    }
}

/// A collection is valid when it is an array and every entry carries a
/// non-empty `id`, `appointment_date` and `appointment_time`.
fn is_structurally_valid(value: &Value) -> bool {
    let Some(entries) = value.as_array() else {
        return false;
    };
    if entries.is_empty() {
        return false;
    }
    entries.iter().all(|entry| {
        ["id", "appointment_date", "appointment_time"].iter().all(|field| {
            entry
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty())
        })
    })
}

fn demo_appointments() -> Vec<Appointment> {
    let today = Local::now().date_naive();
    let patient = Actor::new("patient-demo", Role::Patient);

    let seed = |doctor: &str, date: chrono::NaiveDate, time: &str, status: AppointmentStatus| {
        let mut appointment = Appointment::new(
            NewAppointment {
                patient_id: patient.id.clone(),
                doctor_id: doctor.to_string(),
                appointment_date: date.format(timeutil::DATE_FORMAT).to_string(),
                appointment_time: time.to_string(),
                duration_minutes: 30,
                reason: Some("General consultation".into()),
            },
            &patient,
        );
        appointment.status = status;
        appointment
    };

    vec![
        seed("doctor-chen", today, "10:00 AM", AppointmentStatus::Scheduled),
        seed(
            "doctor-patel",
            today + Duration::days(2),
            "02:30 PM",
            AppointmentStatus::Confirmed,
        ),
        seed(
            "doctor-chen",
            today + Duration::days(7),
            "09:00",
            AppointmentStatus::Pending,
        ),
    ]
}
