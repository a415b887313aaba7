// libs/appointment-cell/src/services/scheduling.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use availability_cell::models::AvailabilitySlot;
use availability_cell::services::store::AvailabilityStore;
use notification_cell::{Notification, NotificationSink};
use shared_models::time::format_time;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, BookingRequest,
    NewAppointment, UpdateAppointmentRequest,
};
use crate::services::reschedule::RescheduleTarget;
use crate::services::store::AppointmentStore;

pub const NO_SLOT_FOUND: &str = "No availability slot found for this date and time";
pub const NEW_SLOT_UNAVAILABLE: &str = "New time slot is not available";
pub const CHANGED_CONCURRENTLY: &str = "Appointment was changed by another request";

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Books, moves and cancels appointments while keeping the doctor's slots in step.
///
/// A slot is taken with [`AvailabilityStore::claim_slot`] before the appointment
/// row is written, so two callers racing for one slot cannot both succeed.
/// Appointment writes that depend on what was read are conditional
/// ([`AppointmentStore::patch_live`]) and slots are only released by the
/// appointment that holds them.
pub struct SchedulingEngine {
    availability: Arc<dyn AvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    notifications: Arc<dyn NotificationSink>,
    notification_timeout: Duration,
}

impl SchedulingEngine {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        appointments: Arc<dyn AppointmentStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            availability,
            appointments,
            notifications,
            notification_timeout: NOTIFICATION_TIMEOUT,
        }
    }

    /// Upper bound on how long an operation waits for the notification sink.
    pub fn with_notification_timeout(mut self, timeout: Duration) -> Self {
        self.notification_timeout = timeout;
        self
    }

    // ==============================================================================
    // BOOKING LIFECYCLE
    // ==============================================================================

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, date = %request.appointment_date))]
    pub async fn create_appointment(
        &self,
        request: BookingRequest,
    ) -> Result<Appointment, AppointmentError> {
        let BookingRequest {
            patient_id,
            doctor_id,
            appointment_date: date,
            appointment_time: time,
            reason,
        } = request;

        let slot = self
            .find_open_slot(doctor_id, date, time)
            .await?
            .ok_or_else(|| AppointmentError::SlotUnavailable(NO_SLOT_FOUND.to_string()))?;

        let appointment_id = Uuid::new_v4();
        if !self.availability.claim_slot(doctor_id, date, time, appointment_id).await? {
            warn!("Slot {} was taken before it could be claimed", slot.id);
            return Err(AppointmentError::SlotUnavailable(NO_SLOT_FOUND.to_string()));
        }

        let inserted = self
            .appointments
            .insert(NewAppointment {
                id: appointment_id,
                patient_id,
                doctor_id,
                appointment_date: date,
                appointment_time: time,
                status: Some(AppointmentStatus::Scheduled),
                reason,
            })
            .await;

        let appointment = match inserted {
            Ok(appointment) => appointment,
            Err(e) => {
                self.release_slot(doctor_id, date, time, appointment_id).await;
                return Err(e.into());
            }
        };

        info!("Appointment {} booked in slot {}", appointment.id, slot.id);

        self.notify(Notification::appointment(
            appointment.patient_id,
            "Appointment scheduled",
            format!(
                "Your appointment on {} at {} has been scheduled.",
                appointment.appointment_date,
                format_time(&appointment.appointment_time)
            ),
        ))
        .await;

        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_date_time: &str,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        if current.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let target = RescheduleTarget::parse(new_date_time)?;
        let (date, time) = match target.slot() {
            Some(slot) => slot,
            None => {
                debug!("Reschedule value '{}' names no slot", new_date_time);
                return Err(AppointmentError::SlotUnavailable(NEW_SLOT_UNAVAILABLE.to_string()));
            }
        };

        if current.is_at(date, time) {
            debug!("Appointment {} already at {} {}", appointment_id, date, time);
            return Ok(current);
        }

        if self.find_open_slot(current.doctor_id, date, time).await?.is_none()
            || !self
                .availability
                .claim_slot(current.doctor_id, date, time, appointment_id)
                .await?
        {
            return Err(AppointmentError::SlotUnavailable(NEW_SLOT_UNAVAILABLE.to_string()));
        }

        let patched = self
            .appointments
            .patch_live(
                appointment_id,
                Some((current.appointment_date, current.appointment_time)),
                &UpdateAppointmentRequest::slot(date, time),
            )
            .await;

        let updated = match patched {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.release_slot(current.doctor_id, date, time, appointment_id).await;
                return Err(self.lost_update(appointment_id).await);
            }
            Err(e) => {
                self.release_slot(current.doctor_id, date, time, appointment_id).await;
                return Err(e.into());
            }
        };

        self.release_slot(
            current.doctor_id,
            current.appointment_date,
            current.appointment_time,
            appointment_id,
        )
        .await;

        info!(
            "Appointment {} moved from {} {} to {} {}",
            appointment_id,
            current.appointment_date,
            format_time(&current.appointment_time),
            date,
            format_time(&time)
        );

        self.notify(Notification::appointment(
            updated.patient_id,
            "Appointment rescheduled",
            with_reason(
                format!(
                    "Your appointment has been moved to {} at {}.",
                    updated.appointment_date,
                    format_time(&updated.appointment_time)
                ),
                reason.as_deref(),
            ),
        ))
        .await;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        if current.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let cancelled = match self
            .appointments
            .patch_live(
                appointment_id,
                None,
                &UpdateAppointmentRequest::status(AppointmentStatus::Cancelled),
            )
            .await?
        {
            Some(cancelled) => cancelled,
            None => return Err(self.lost_update(appointment_id).await),
        };

        self.release_slot(
            cancelled.doctor_id,
            cancelled.appointment_date,
            cancelled.appointment_time,
            appointment_id,
        )
        .await;

        info!("Appointment {} cancelled", appointment_id);

        self.notify(Notification::appointment(
            cancelled.patient_id,
            "Appointment cancelled",
            with_reason(
                format!(
                    "Your appointment on {} at {} has been cancelled.",
                    cancelled.appointment_date,
                    format_time(&cancelled.appointment_time)
                ),
                reason.as_deref(),
            ),
        ))
        .await;

        Ok(cancelled)
    }

    /// Administrative hard delete. The slot is left as it is.
    #[instrument(skip(self))]
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        let deleted = self.appointments.remove(appointment_id).await?;
        if deleted {
            warn!("Appointment {} deleted without slot release", appointment_id);
        }
        Ok(deleted)
    }

    /// Plain field update without slot bookkeeping. A new date or time must
    /// still point at an open slot; cancelling goes through
    /// [`cancel_appointment`](Self::cancel_appointment).
    #[instrument(skip(self, patch))]
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;

        if let Some(status) = patch.status {
            if status == AppointmentStatus::Cancelled && current.status != AppointmentStatus::Cancelled {
                return Err(AppointmentError::ValidationError(
                    "Use the cancel operation to cancel an appointment".to_string(),
                ));
            }
            if !current.status.can_transition_to(status) {
                return Err(AppointmentError::ValidationError(format!(
                    "Cannot change status from {} to {}",
                    current.status, status
                )));
            }
        }

        if patch.moves_appointment() {
            let date = patch.appointment_date.unwrap_or(current.appointment_date);
            let time = patch.appointment_time.unwrap_or(current.appointment_time);

            if !current.is_at(date, time)
                && self.find_open_slot(current.doctor_id, date, time).await?.is_none()
            {
                return Err(AppointmentError::SlotUnavailable(NEW_SLOT_UNAVAILABLE.to_string()));
            }
        }

        if current.status == AppointmentStatus::Cancelled {
            return self
                .appointments
                .patch(appointment_id, &patch)
                .await?
                .ok_or(AppointmentError::NotFound);
        }

        let expected_slot = patch
            .moves_appointment()
            .then_some((current.appointment_date, current.appointment_time));

        match self.appointments.patch_live(appointment_id, expected_slot, &patch).await? {
            Some(updated) => Ok(updated),
            None => Err(self.lost_update(appointment_id).await),
        }
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointments(
        &self,
        criteria: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.appointments.list(criteria).await?)
    }

    pub async fn get_appointment_by_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.get(appointment_id).await?)
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// The doctor's slot at exactly `time` on `date` that is available and unlinked.
    async fn find_open_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<AvailabilitySlot>, AppointmentError> {
        let slots = self.availability.find_slots_for_doctor(doctor_id, Some(date)).await?;
        Ok(slots.into_iter().find(|slot| slot.time == time && slot.is_open()))
    }

    /// Why a conditional write on a previously loaded appointment matched nothing.
    async fn lost_update(&self, appointment_id: Uuid) -> AppointmentError {
        match self.appointments.get(appointment_id).await {
            Ok(None) => AppointmentError::NotFound,
            Ok(Some(appointment)) if appointment.status == AppointmentStatus::Cancelled => {
                AppointmentError::AlreadyCancelled
            }
            Ok(Some(_)) => AppointmentError::Conflict(CHANGED_CONCURRENTLY.to_string()),
            Err(e) => e.into(),
        }
    }

    /// Free the slot held by `appointment_id`. A slot that has meanwhile gone
    /// to another appointment is left alone.
    async fn release_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime, appointment_id: Uuid) {
        match self
            .availability
            .release_slot(doctor_id, date, time, appointment_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(
                "Slot of doctor {} at {} {} is not held by appointment {}",
                doctor_id,
                date,
                format_time(&time),
                appointment_id
            ),
            Err(e) => error!(
                "Failed to release slot of doctor {} at {} {}: {}",
                doctor_id,
                date,
                format_time(&time),
                e
            ),
        }
    }

    async fn notify(&self, notification: Notification) {
        let sent = tokio::time::timeout(self.notification_timeout, self.notifications.send(&notification)).await;

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                "Failed to send '{}' notification to {}: {}",
                notification.title, notification.user_id, e
            ),
            Err(_) => warn!(
                "Timed out sending '{}' notification to {}",
                notification.title, notification.user_id
            ),
        }
    }
}

fn with_reason(message: String, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|reason| !reason.is_empty()) {
        Some(reason) => format!("{} Reason: {}", message, reason),
        None => message,
    }
}
