// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use security_cell::{AuditAction, AuditService};
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{parse_body, require_role, user_id};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, BookingRequest, CancelAppointmentRequest,
    CreateAppointmentRequest, RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::scheduling::SchedulingEngine;

const ENTITY: &str = "appointment";

#[derive(Clone)]
pub struct AppointmentState {
    pub engine: Arc<SchedulingEngine>,
    pub audit: AuditService,
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::SlotUnavailable(msg) | AppointmentError::Conflict(msg) => {
                AppError::Conflict(msg)
            }
            AppointmentError::AlreadyCancelled => {
                AppError::Conflict(AppointmentError::AlreadyCancelled.to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::BadRequest(msg),
            AppointmentError::DatabaseError(msg) => {
                error!("Appointment storage failure: {}", msg);
                AppError::BadRequest(msg)
            }
        }
    }
}

// ==============================================================================
// ACCESS HELPERS
// ==============================================================================

/// Admins see everything; everyone else only appointments they take part in.
fn ensure_participant(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    match Uuid::parse_str(&user.id) {
        Ok(id) if appointment.involves(id) => Ok(()),
        _ => Err(AppError::Forbidden("Access denied".to_string())),
    }
}

async fn load_for(state: &AppointmentState, user: &User, appointment_id: Uuid) -> Result<Appointment, AppError> {
    let appointment = state
        .engine
        .get_appointment_by_id(appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    ensure_participant(user, &appointment)?;
    Ok(appointment)
}

/// Narrow listing criteria to what the caller may see.
fn scope_query(user: &User, mut query: AppointmentSearchQuery) -> Result<AppointmentSearchQuery, AppError> {
    match require_role(user, &[Role::Patient, Role::Doctor, Role::Admin])? {
        Role::Patient => query.patient_id = Some(user_id(user)?),
        Role::Doctor => query.doctor_id = Some(user_id(user)?),
        Role::Admin => {}
    }
    Ok(query)
}

// ==============================================================================
// HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let criteria = scope_query(&user, query)?;
    let appointments = state.engine.get_appointments(&criteria).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request: CreateAppointmentRequest = parse_body(body)?;

    let patient_id = match require_role(&user, &[Role::Patient, Role::Doctor, Role::Admin])? {
        Role::Patient => {
            let me = user_id(&user)?;
            if request.patient_id.is_some_and(|id| id != me) {
                return Err(AppError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                ));
            }
            me
        }
        _ => request
            .patient_id
            .ok_or_else(|| AppError::BadRequest("patient_id is required".to_string()))?,
    };

    let appointment = state
        .engine
        .create_appointment(BookingRequest {
            patient_id,
            doctor_id: request.doctor_id,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            reason: request.reason,
        })
        .await?;

    state
        .audit
        .log_action(Some(&user.id), AuditAction::Create, ENTITY, Some(&appointment.id.to_string()))
        .await;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = load_for(&state, &user, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;
    load_for(&state, &user, appointment_id).await?;
    let patch: UpdateAppointmentRequest = parse_body(body)?;

    let appointment = state.engine.update_appointment(appointment_id, patch).await?;

    state
        .audit
        .log_action(Some(&user.id), AuditAction::Update, ENTITY, Some(&appointment_id.to_string()))
        .await;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    load_for(&state, &user, appointment_id).await?;
    let request: RescheduleAppointmentRequest = parse_body(body)?;

    let appointment = state
        .engine
        .reschedule_appointment(appointment_id, &request.new_date_time, request.reason)
        .await?;

    state
        .audit
        .log_action(Some(&user.id), AuditAction::Reschedule, ENTITY, Some(&appointment_id.to_string()))
        .await;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    load_for(&state, &user, appointment_id).await?;

    // the body is optional
    let request: CancelAppointmentRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelAppointmentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let appointment = state
        .engine
        .cancel_appointment(appointment_id, request.reason)
        .await?;

    state
        .audit
        .log_action(Some(&user.id), AuditAction::Cancel, ENTITY, Some(&appointment_id.to_string()))
        .await;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;

    if !state.engine.delete_appointment(appointment_id).await? {
        return Err(AppError::NotFound("Appointment not found".to_string()));
    }

    info!("Admin {} deleted appointment {}", user.id, appointment_id);
    state
        .audit
        .log_action(Some(&user.id), AuditAction::Delete, ENTITY, Some(&appointment_id.to_string()))
        .await;

    Ok(StatusCode::NO_CONTENT)
}
