use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AvailabilitySlot, NewSlot, UpdateSlotRequest};
use crate::services::store::AvailabilityStore;

/// Process-local slot store. Every check-and-write happens under one write lock.
#[derive(Clone, Default)]
pub struct InMemoryAvailabilityStore {
    slots: Arc<RwLock<HashMap<Uuid, AvailabilitySlot>>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_slots(slots: &mut [AvailabilitySlot]) {
    slots.sort_by(|a, b| a.date.cmp(&b.date).then(a.time.cmp(&b.time)));
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn find_slots_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilitySlot>> {
        let slots = self.slots.read().await;
        let mut found: Vec<AvailabilitySlot> = slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .filter(|slot| date.map_or(true, |date| slot.date == date))
            .cloned()
            .collect();
        sort_slots(&mut found);
        Ok(found)
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<AvailabilitySlot>> {
        Ok(self.slots.read().await.get(&slot_id).cloned())
    }

    async fn set_slot_booked_state(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        is_available: bool,
    ) -> Result<()> {
        let mut slots = self.slots.write().await;
        let now = Utc::now();

        for slot in slots
            .values_mut()
            .filter(|slot| slot.doctor_id == doctor_id && slot.matches(date, time))
        {
            slot.is_available = is_available;
            if is_available {
                slot.appointment_id = None;
            }
            slot.updated_at = now;
        }

        Ok(())
    }

    async fn release_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        appointment_id: Uuid,
    ) -> Result<bool> {
        let mut slots = self.slots.write().await;

        let owned = slots.values_mut().find(|slot| {
            slot.doctor_id == doctor_id
                && slot.matches(date, time)
                && slot.appointment_id == Some(appointment_id)
        });

        match owned {
            Some(slot) => {
                slot.is_available = true;
                slot.appointment_id = None;
                slot.updated_at = Utc::now();
                debug!("Slot {} released by appointment {}", slot.id, appointment_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn claim_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        appointment_id: Uuid,
    ) -> Result<bool> {
        let mut slots = self.slots.write().await;

        let open = slots
            .values_mut()
            .find(|slot| slot.doctor_id == doctor_id && slot.matches(date, time) && slot.is_open());

        match open {
            Some(slot) => {
                slot.is_available = false;
                slot.appointment_id = Some(appointment_id);
                slot.updated_at = Utc::now();
                debug!("Slot {} claimed by appointment {}", slot.id, appointment_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn bulk_create_slots(
        &self,
        doctor_id: Uuid,
        new_slots: &[NewSlot],
    ) -> Result<Vec<AvailabilitySlot>> {
        let mut slots = self.slots.write().await;
        let now = Utc::now();

        let mut created: Vec<AvailabilitySlot> = new_slots
            .iter()
            .map(|new_slot| AvailabilitySlot {
                id: Uuid::new_v4(),
                doctor_id,
                date: new_slot.date,
                time: new_slot.time,
                is_available: new_slot.is_available.unwrap_or(true),
                appointment_id: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        for slot in &created {
            slots.insert(slot.id, slot.clone());
        }

        sort_slots(&mut created);
        Ok(created)
    }

    async fn update_slot(
        &self,
        slot_id: Uuid,
        patch: &UpdateSlotRequest,
    ) -> Result<Option<AvailabilitySlot>> {
        let mut slots = self.slots.write().await;

        let Some(slot) = slots.get_mut(&slot_id) else {
            return Ok(None);
        };

        if patch.is_empty() {
            return Ok(Some(slot.clone()));
        }
        if slot.is_booked() {
            return Ok(None);
        }

        if let Some(date) = patch.date {
            slot.date = date;
        }
        if let Some(time) = patch.time {
            slot.time = time;
        }
        if let Some(is_available) = patch.is_available {
            slot.is_available = is_available;
        }
        slot.updated_at = Utc::now();

        Ok(Some(slot.clone()))
    }

    async fn delete_slot(&self, slot_id: Uuid) -> Result<bool> {
        let mut slots = self.slots.write().await;
        match slots.get(&slot_id) {
            Some(slot) if !slot.is_booked() => Ok(slots.remove(&slot_id).is_some()),
            _ => Ok(false),
        }
    }
}
