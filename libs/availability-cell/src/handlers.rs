use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{parse_body, require_role, user_id};

use crate::models::{
    AvailabilityError, AvailabilityQuery, AvailabilitySlot, CreateSlotsQuery, NewSlot,
    UpdateSlotRequest,
};
use crate::services::availability::AvailabilityService;

#[derive(Clone)]
pub struct AvailabilityState {
    pub service: Arc<AvailabilityService>,
}

impl From<AvailabilityError> for AppError {
    fn from(e: AvailabilityError) -> Self {
        match e {
            AvailabilityError::NotFound => AppError::NotFound("Slot not found".to_string()),
            AvailabilityError::ValidationError(msg) => AppError::BadRequest(msg),
            AvailabilityError::DatabaseError(msg) => {
                warn!("Availability storage failure: {}", msg);
                AppError::Database(msg)
            }
        }
    }
}

/// Doctors may only manage their own slots; admins manage any.
async fn ensure_slot_access(
    state: &AvailabilityState,
    user: &User,
    slot_id: Uuid,
) -> Result<(), AppError> {
    if require_role(user, &[Role::Doctor, Role::Admin])? == Role::Admin {
        return Ok(());
    }

    let slot: AvailabilitySlot = state.service.get_slot(slot_id).await?;
    if slot.doctor_id != user_id(user)? {
        return Err(AppError::Forbidden(
            "Access denied: You can only manage your own availability".to_string(),
        ));
    }

    Ok(())
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state.service.get_doctor_availability(doctor_id, query.date).await?;

    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Query(query): Query<CreateSlotsQuery>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = match require_role(&user, &[Role::Doctor, Role::Admin])? {
        Role::Admin => query
            .doctor_id
            .ok_or_else(|| AppError::BadRequest("doctor_id query parameter is required".to_string()))?,
        _ => user_id(&user)?,
    };

    if !body.is_array() {
        return Err(AppError::BadRequest(
            "Request body must be an array of availability slots".to_string(),
        ));
    }
    let slots: Vec<NewSlot> = parse_body(body)?;

    let created = state.service.set_availability(doctor_id, slots).await?;

    Ok((StatusCode::CREATED, Json(json!(created))))
}

#[axum::debug_handler]
pub async fn update_slot(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    ensure_slot_access(&state, &user, slot_id).await?;
    let patch: UpdateSlotRequest = parse_body(body)?;

    let slot = state
        .service
        .update_slot(slot_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ensure_slot_access(&state, &user, slot_id).await?;

    if state.service.delete_slot(slot_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Slot not found".to_string()))
    }
}
