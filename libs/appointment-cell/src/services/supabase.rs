use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_models::time::format_time;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, NewAppointment, UpdateAppointmentRequest,
};
use crate::services::store::AppointmentStore;

const TABLE: &str = "/rest/v1/appointments";

/// Appointment store backed by the `appointments` table through PostgREST.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// PATCH the rows selected by `path` and return the first changed row.
    async fn patch_rows(&self, path: &str, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>> {
        let mut update_data = Map::new();
        if let Some(date) = patch.appointment_date {
            update_data.insert("appointment_date".to_string(), json!(date));
        }
        if let Some(time) = patch.appointment_time {
            update_data.insert("appointment_time".to_string(), json!(format_time(&time)));
        }
        if let Some(status) = patch.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(reason) = &patch.reason {
            update_data.insert("reason".to_string(), json!(reason));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                path,
                Some(self.supabase.service_token()),
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn list(&self, criteria: &AppointmentSearchQuery) -> Result<Vec<Appointment>> {
        let mut query_parts = Vec::new();
        if let Some(patient_id) = criteria.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = criteria.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = criteria.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=appointment_date.desc,appointment_time.desc".to_string());

        let path = format!("{}?{}", TABLE, query_parts.join("&"));
        debug!("Listing appointments: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "id": appointment.id,
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "appointment_date": appointment.appointment_date,
            "appointment_time": format_time(&appointment.appointment_time),
            "status": appointment.status.unwrap_or(AppointmentStatus::Scheduled),
            "reason": appointment.reason,
            "created_at": now,
            "updated_at": now,
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                Some(self.supabase.service_token()),
                Some(body),
                Some(return_representation()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create appointment"))
    }

    async fn patch(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>> {
        if patch.is_empty() {
            return self.get(id).await;
        }

        self.patch_rows(&format!("{}?id=eq.{}", TABLE, id), patch).await
    }

    async fn patch_live(
        &self,
        id: Uuid,
        expected_slot: Option<(NaiveDate, NaiveTime)>,
        patch: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>> {
        let mut path = format!("{}?id=eq.{}&status=neq.{}", TABLE, id, AppointmentStatus::Cancelled);
        if let Some((date, time)) = expected_slot {
            path.push_str(&format!(
                "&appointment_date=eq.{}&appointment_time=eq.{}",
                date,
                time.format("%H:%M:%S")
            ));
        }

        if patch.is_empty() {
            let rows: Vec<Appointment> = self
                .supabase
                .request(Method::GET, &path, Some(self.supabase.service_token()), None)
                .await?;
            return Ok(rows.into_iter().next());
        }

        let updated = self.patch_rows(&path, patch).await?;
        if updated.is_none() {
            debug!("Conditional update of appointment {} matched no row", id);
        }
        Ok(updated)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(self.supabase.service_token()),
                None,
                Some(return_representation()),
            )
            .await?;

        Ok(!rows.is_empty())
    }
}
