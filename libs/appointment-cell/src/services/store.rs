use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentSearchQuery, NewAppointment, UpdateAppointmentRequest};

/// Persistence of appointment records.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Matching appointments, most recent first (date, then time, descending).
    async fn list(&self, criteria: &AppointmentSearchQuery) -> Result<Vec<Appointment>>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// Status defaults to `scheduled` when not given.
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment>;

    /// Overwrite only the supplied fields. An empty patch returns the record unchanged.
    async fn patch(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>>;

    /// Like [`patch`](AppointmentStore::patch), applied in one conditional
    /// write: only while the appointment is not cancelled and, when
    /// `expected_slot` is given, still at that date and time. `None` when the
    /// row is missing or the condition no longer holds.
    async fn patch_live(
        &self,
        id: Uuid,
        expected_slot: Option<(NaiveDate, NaiveTime)>,
        patch: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>>;

    async fn remove(&self, id: Uuid) -> Result<bool>;
}
