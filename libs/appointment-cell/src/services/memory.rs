use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, NewAppointment, UpdateAppointmentRequest,
};
use crate::services::store::AppointmentStore;

/// Process-local appointment store. Rejects a second live appointment for the
/// same doctor, date and time the same way the database index does.
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clashes(existing: &Appointment, other: &Appointment) -> bool {
    existing.id != other.id
        && existing.status != AppointmentStatus::Cancelled
        && other.status != AppointmentStatus::Cancelled
        && existing.doctor_id == other.doctor_id
        && existing.is_at(other.appointment_date, other.appointment_time)
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn list(&self, criteria: &AppointmentSearchQuery) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| criteria.matches(appointment))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            b.appointment_date
                .cmp(&a.appointment_date)
                .then(b.appointment_time.cmp(&a.appointment_time))
        });
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn insert(&self, new: NewAppointment) -> Result<Appointment> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&new.id) {
            bail!("Conflict: appointment {} already exists", new.id);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: new.id,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            appointment_date: new.appointment_date,
            appointment_time: new.appointment_time,
            status: new.status.unwrap_or(AppointmentStatus::Scheduled),
            reason: new.reason,
            created_at: now,
            updated_at: now,
        };

        if appointments.values().any(|existing| clashes(existing, &appointment)) {
            bail!(
                "Conflict: doctor {} already has an appointment at {} {}",
                appointment.doctor_id,
                appointment.appointment_date,
                appointment.appointment_time
            );
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn patch(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;
        apply_patch(&mut appointments, id, patch)
    }

    async fn patch_live(
        &self,
        id: Uuid,
        expected_slot: Option<(NaiveDate, NaiveTime)>,
        patch: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;

        let live = appointments.get(&id).is_some_and(|current| {
            current.status != AppointmentStatus::Cancelled
                && expected_slot.map_or(true, |(date, time)| current.is_at(date, time))
        });
        if !live {
            return Ok(None);
        }

        apply_patch(&mut appointments, id, patch)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        Ok(self.appointments.write().await.remove(&id).is_some())
    }
}

/// Caller holds the write lock.
fn apply_patch(
    appointments: &mut HashMap<Uuid, Appointment>,
    id: Uuid,
    patch: &UpdateAppointmentRequest,
) -> Result<Option<Appointment>> {
    let Some(current) = appointments.get(&id) else {
        return Ok(None);
    };
    if patch.is_empty() {
        return Ok(Some(current.clone()));
    }

    let mut updated = current.clone();
    if let Some(date) = patch.appointment_date {
        updated.appointment_date = date;
    }
    if let Some(time) = patch.appointment_time {
        updated.appointment_time = time;
    }
    if let Some(status) = patch.status {
        updated.status = status;
    }
    if let Some(reason) = &patch.reason {
        updated.reason = Some(reason.clone());
    }
    updated.updated_at = Utc::now();

    if appointments.values().any(|existing| clashes(existing, &updated)) {
        bail!(
            "Conflict: doctor {} already has an appointment at {} {}",
            updated.doctor_id,
            updated.appointment_date,
            updated.appointment_time
        );
    }

    appointments.insert(id, updated.clone());
    Ok(Some(updated))
}
