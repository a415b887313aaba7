#![allow(dead_code)]

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::Barrier;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentSearchQuery, NewAppointment, UpdateAppointmentRequest,
};
use appointment_cell::{AppointmentStore, BookingRequest, InMemoryAppointmentStore, SchedulingEngine};
use availability_cell::models::NewSlot;
use availability_cell::{AvailabilityStore, InMemoryAvailabilityStore};
use notification_cell::{LogNotificationSink, NotificationSink};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

pub struct Harness {
    pub engine: Arc<SchedulingEngine>,
    pub slots: Arc<InMemoryAvailabilityStore>,
    pub appointments: Arc<InMemoryAppointmentStore>,
    pub doctor_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(LogNotificationSink))
    }

    pub fn with_sink(sink: Arc<dyn NotificationSink>) -> Self {
        let slots = Arc::new(InMemoryAvailabilityStore::new());
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let engine = Arc::new(SchedulingEngine::new(slots.clone(), appointments.clone(), sink));

        Self {
            engine,
            slots,
            appointments,
            doctor_id: Uuid::new_v4(),
        }
    }

    /// The first `parties` appointment reads wait for each other, so that many
    /// operations all act on the same loaded state.
    pub fn with_load_gate(parties: usize) -> Self {
        let slots = Arc::new(InMemoryAvailabilityStore::new());
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let gated = Arc::new(LoadGate::new(appointments.as_ref().clone(), parties));
        let engine = Arc::new(SchedulingEngine::new(slots.clone(), gated, Arc::new(LogNotificationSink)));

        Self {
            engine,
            slots,
            appointments,
            doctor_id: Uuid::new_v4(),
        }
    }

    pub async fn open_slot(&self, d: &str, t: &str) {
        self.slots
            .bulk_create_slots(
                self.doctor_id,
                &[NewSlot { date: date(d), time: time(t), is_available: None }],
            )
            .await
            .unwrap();
    }

    pub fn booking(&self, patient_id: Uuid, d: &str, t: &str) -> BookingRequest {
        BookingRequest {
            patient_id,
            doctor_id: self.doctor_id,
            appointment_date: date(d),
            appointment_time: time(t),
            reason: Some("Checkup".to_string()),
        }
    }

    /// (is_available, appointment_id) of the doctor's slot at `d t`.
    pub async fn slot_state(&self, d: &str, t: &str) -> (bool, Option<Uuid>) {
        let slots = self
            .slots
            .find_slots_for_doctor(self.doctor_id, Some(date(d)))
            .await
            .unwrap();
        let slot = slots.into_iter().find(|slot| slot.time == time(t)).unwrap();
        (slot.is_available, slot.appointment_id)
    }
}

pub struct LoadGate {
    inner: InMemoryAppointmentStore,
    pending: AtomicIsize,
    barrier: Barrier,
}

impl LoadGate {
    pub fn new(inner: InMemoryAppointmentStore, parties: usize) -> Self {
        Self {
            inner,
            pending: AtomicIsize::new(parties as isize),
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl AppointmentStore for LoadGate {
    async fn list(&self, criteria: &AppointmentSearchQuery) -> anyhow::Result<Vec<Appointment>> {
        self.inner.list(criteria).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Appointment>> {
        let found = self.inner.get(id).await?;
        if self.pending.fetch_sub(1, Ordering::SeqCst) > 0 {
            self.barrier.wait().await;
        }
        Ok(found)
    }

    async fn insert(&self, appointment: NewAppointment) -> anyhow::Result<Appointment> {
        self.inner.insert(appointment).await
    }

    async fn patch(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> anyhow::Result<Option<Appointment>> {
        self.inner.patch(id, patch).await
    }

    async fn patch_live(
        &self,
        id: Uuid,
        expected_slot: Option<(NaiveDate, NaiveTime)>,
        patch: &UpdateAppointmentRequest,
    ) -> anyhow::Result<Option<Appointment>> {
        self.inner.patch_live(id, expected_slot, patch).await
    }

    async fn remove(&self, id: Uuid) -> anyhow::Result<bool> {
        self.inner.remove(id).await
    }
}
