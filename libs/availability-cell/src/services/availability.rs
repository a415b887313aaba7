use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{AvailabilityError, AvailabilitySlot, NewSlot, UpdateSlotRequest};
use crate::services::store::AvailabilityStore;

/// Slot management for doctors and administrators.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn AvailabilityStore> {
        Arc::clone(&self.store)
    }

    #[instrument(skip(self))]
    pub async fn get_doctor_availability(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        Ok(self.store.find_slots_for_doctor(doctor_id, date).await?)
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, AvailabilityError> {
        self.store
            .find_slot(slot_id)
            .await?
            .ok_or(AvailabilityError::NotFound)
    }

    /// Create a batch of slots. The batch must be non-empty and must not repeat
    /// a `(date, time)` already present in the batch or in the doctor's schedule.
    #[instrument(skip(self, slots), fields(count = slots.len()))]
    pub async fn set_availability(
        &self,
        doctor_id: Uuid,
        slots: Vec<NewSlot>,
    ) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        if slots.is_empty() {
            return Err(AvailabilityError::ValidationError(
                "At least one availability slot is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for slot in &slots {
            if !seen.insert((slot.date, slot.time)) {
                return Err(AvailabilityError::ValidationError(format!(
                    "Duplicate slot {} {} in request",
                    slot.date,
                    shared_models::time::format_time(&slot.time)
                )));
            }
        }

        let existing = self.store.find_slots_for_doctor(doctor_id, None).await?;
        if let Some(clash) = existing.iter().find(|slot| seen.contains(&(slot.date, slot.time))) {
            return Err(AvailabilityError::ValidationError(format!(
                "Slot {} {} already exists",
                clash.date,
                shared_models::time::format_time(&clash.time)
            )));
        }

        let created = self.store.bulk_create_slots(doctor_id, &slots).await?;
        info!("Created {} slot(s) for doctor {}", created.len(), doctor_id);

        Ok(created)
    }

    /// Returns `Ok(None)` when the slot does not exist.
    #[instrument(skip(self))]
    pub async fn update_slot(
        &self,
        slot_id: Uuid,
        patch: UpdateSlotRequest,
    ) -> Result<Option<AvailabilitySlot>, AvailabilityError> {
        let Some(current) = self.store.find_slot(slot_id).await? else {
            return Ok(None);
        };

        if current.is_booked() && !patch.is_empty() {
            return Err(booked_error());
        }

        if patch.moves_slot() {
            let date = patch.date.unwrap_or(current.date);
            let time = patch.time.unwrap_or(current.time);

            let same_day = self
                .store
                .find_slots_for_doctor(current.doctor_id, Some(date))
                .await?;
            if same_day.iter().any(|slot| slot.id != slot_id && slot.time == time) {
                return Err(AvailabilityError::ValidationError(format!(
                    "Slot {} {} already exists",
                    date,
                    shared_models::time::format_time(&time)
                )));
            }
        }

        debug!("Updating slot {}", slot_id);
        match self.store.update_slot(slot_id, &patch).await? {
            Some(updated) => Ok(Some(updated)),
            // booked between the read above and the write
            None => self.refusal(slot_id).await.map(|_| None),
        }
    }

    /// Booked slots are kept. Returns `Ok(false)` when the slot does not exist.
    pub async fn delete_slot(&self, slot_id: Uuid) -> Result<bool, AvailabilityError> {
        if self.store.delete_slot(slot_id).await? {
            info!("Deleted slot {}", slot_id);
            return Ok(true);
        }

        self.refusal(slot_id).await.map(|_| false)
    }

    /// Explain why a guarded write changed nothing: `Ok` when the slot is
    /// gone, a validation error when it is linked to an appointment.
    async fn refusal(&self, slot_id: Uuid) -> Result<(), AvailabilityError> {
        match self.store.find_slot(slot_id).await? {
            None => Ok(()),
            Some(slot) if slot.is_booked() => Err(booked_error()),
            Some(_) => Err(AvailabilityError::ValidationError(
                "Slot changed while it was being modified, try again".to_string(),
            )),
        }
    }
}

fn booked_error() -> AvailabilityError {
    AvailabilityError::ValidationError("Slot is booked by an appointment and cannot be changed".to_string())
}
