use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::models::{AvailabilitySlot, NewSlot, UpdateSlotRequest};

/// Persistence of per-doctor availability slots.
///
/// Slots are matched by exact `(doctor_id, date, time)`. Implementations must
/// make [`claim_slot`](AvailabilityStore::claim_slot) a single atomic
/// conditional update.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Slots of a doctor ordered by date, then time. `date` narrows to one day.
    async fn find_slots_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilitySlot>>;

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<AvailabilitySlot>>;

    /// Flip the availability flag of the matching slot. Releasing (`true`)
    /// also clears the appointment link. No-op when nothing matches.
    async fn set_slot_booked_state(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        is_available: bool,
    ) -> Result<()>;

    /// Give a slot back, but only while it is still linked to
    /// `appointment_id`. Returns `false` when the slot belongs to someone else
    /// or does not exist.
    async fn release_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        appointment_id: Uuid,
    ) -> Result<bool>;

    /// Take an open slot for `appointment_id`. Returns `false` when no open
    /// slot matched, including when another caller won the race.
    async fn claim_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        appointment_id: Uuid,
    ) -> Result<bool>;

    async fn bulk_create_slots(
        &self,
        doctor_id: Uuid,
        slots: &[NewSlot],
    ) -> Result<Vec<AvailabilitySlot>>;

    /// Applies only to a slot with no appointment link. `None` when the slot
    /// is missing or booked.
    async fn update_slot(
        &self,
        slot_id: Uuid,
        patch: &UpdateSlotRequest,
    ) -> Result<Option<AvailabilitySlot>>;

    /// Removes only a slot with no appointment link.
    async fn delete_slot(&self, slot_id: Uuid) -> Result<bool>;
}
