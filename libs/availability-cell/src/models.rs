use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A bookable time unit of one doctor on a concrete date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "shared_models::time")]
    pub time: NaiveTime,
    pub is_available: bool,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    /// Available and not linked to any appointment.
    pub fn is_open(&self) -> bool {
        self.is_available && self.appointment_id.is_none()
    }

    pub fn is_booked(&self) -> bool {
        self.appointment_id.is_some()
    }

    pub fn matches(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.date == date && self.time == time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSlot {
    pub date: NaiveDate,
    #[serde(with = "shared_models::time")]
    pub time: NaiveTime,
    #[serde(default)]
    pub is_available: Option<bool>,
}

/// Partial update of a slot; absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateSlotRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "shared_models::time::option")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl UpdateSlotRequest {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.is_available.is_none()
    }

    pub fn moves_slot(&self) -> bool {
        self.date.is_some() || self.time.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSlotsQuery {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Slot not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AvailabilityError {
    fn from(e: anyhow::Error) -> Self {
        AvailabilityError::DatabaseError(e.to_string())
    }
}
