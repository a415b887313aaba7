use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{AvailabilitySlot, NewSlot, UpdateSlotRequest};
use crate::services::store::AvailabilityStore;

const TABLE: &str = "/rest/v1/availabilities";

/// Slot store backed by the `availabilities` table through PostgREST.
pub struct SupabaseAvailabilityStore {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn slot_filter(doctor_id: Uuid, date: NaiveDate, time: NaiveTime) -> String {
        format!(
            "{}?doctor_id=eq.{}&date=eq.{}&time=eq.{}",
            TABLE,
            doctor_id,
            date,
            time.format("%H:%M:%S")
        )
    }

    async fn patch_rows(&self, path: &str, body: Value) -> Result<Vec<AvailabilitySlot>> {
        self.supabase
            .request_with_headers(
                Method::PATCH,
                path,
                Some(self.supabase.service_token()),
                Some(body),
                Some(return_representation()),
            )
            .await
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn find_slots_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilitySlot>> {
        debug!("Fetching slots for doctor {} (date: {:?})", doctor_id, date);

        let mut path = format!("{}?doctor_id=eq.{}", TABLE, doctor_id);
        if let Some(date) = date {
            path.push_str(&format!("&date=eq.{}", date));
        }
        path.push_str("&order=date.asc,time.asc");

        self.supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<AvailabilitySlot>> {
        let path = format!("{}?id=eq.{}", TABLE, slot_id);
        let rows: Vec<AvailabilitySlot> = self
            .supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn set_slot_booked_state(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        is_available: bool,
    ) -> Result<()> {
        let mut body = json!({
            "is_available": is_available,
            "updated_at": Utc::now().to_rfc3339(),
        });
        if is_available {
            body["appointment_id"] = Value::Null;
        }

        let updated = self
            .patch_rows(&Self::slot_filter(doctor_id, date, time), body)
            .await?;

        if updated.is_empty() {
            debug!("No slot matched doctor {} at {} {}", doctor_id, date, time);
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
        let path = format!(
            "{}&appointment_id=eq.{}",
            Self::slot_filter(doctor_id, date, time),
            appointment_id
        );

        let released = self
            .patch_rows(
                &path,
                json!({
                    "is_available": true,
                    "appointment_id": Value::Null,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        Ok(!released.is_empty())
    }

    async fn claim_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        appointment_id: Uuid,
    ) -> Result<bool> {
        let path = format!(
            "{}&is_available=eq.true&appointment_id=is.null",
            Self::slot_filter(doctor_id, date, time)
        );

        let claimed = self
            .patch_rows(
                &path,
                json!({
                    "is_available": false,
                    "appointment_id": appointment_id,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        debug!("Claim of {} {} for doctor {} changed {} row(s)", date, time, doctor_id, claimed.len());
        Ok(claimed.len() == 1)
    }

    async fn bulk_create_slots(
        &self,
        doctor_id: Uuid,
        slots: &[NewSlot],
    ) -> Result<Vec<AvailabilitySlot>> {
        let now = Utc::now().to_rfc3339();
        let rows: Vec<Value> = slots
            .iter()
            .map(|slot| {
                json!({
                    "doctor_id": doctor_id,
                    "date": slot.date,
                    "time": shared_models::time::format_time(&slot.time),
                    "is_available": slot.is_available.unwrap_or(true),
                    "created_at": now,
                    "updated_at": now,
                })
            })
            .collect();

        let mut created: Vec<AvailabilitySlot> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                Some(self.supabase.service_token()),
                Some(Value::Array(rows)),
                Some(return_representation()),
            )
            .await?;

        created.sort_by(|a, b| a.date.cmp(&b.date).then(a.time.cmp(&b.time)));
        Ok(created)
    }

    async fn update_slot(
        &self,
        slot_id: Uuid,
        patch: &UpdateSlotRequest,
    ) -> Result<Option<AvailabilitySlot>> {
        if patch.is_empty() {
            return self.find_slot(slot_id).await;
        }

        let mut update_data = Map::new();
        if let Some(date) = patch.date {
            update_data.insert("date".to_string(), json!(date));
        }
        if let Some(time) = patch.time {
            update_data.insert("time".to_string(), json!(shared_models::time::format_time(&time)));
        }
        if let Some(is_available) = patch.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("{}?id=eq.{}&appointment_id=is.null", TABLE, slot_id);
        let updated = self.patch_rows(&path, Value::Object(update_data)).await?;

        Ok(updated.into_iter().next())
    }

    async fn delete_slot(&self, slot_id: Uuid) -> Result<bool> {
        let path = format!("{}?id=eq.{}&appointment_id=is.null", TABLE, slot_id);
        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(self.supabase.service_token()),
                None,
                Some(return_representation()),
            )
            .await?;

        Ok(!deleted.is_empty())
    }
}
