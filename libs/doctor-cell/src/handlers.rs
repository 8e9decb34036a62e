use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{parse_wall_clock, weekday_from_index, AddIntervalRequest};
use crate::services::SlotRegistry;

#[derive(Clone)]
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<SlotRegistry>,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_weekly_availability(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let days = state.registry.list_week(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn get_day_availability(
    State(state): State<DoctorCellState>,
    Path((doctor_id, day_of_week)): Path<(Uuid, u8)>,
) -> Result<Json<Value>, AppError> {
    let weekday = weekday_from_index(day_of_week)?;
    let intervals = state.registry.list_day(doctor_id, weekday).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": day_of_week,
        "intervals": intervals
    })))
}

// ==============================================================================
// PROTECTED HANDLERS (CALLING DOCTOR EDITS THEIR OWN SCHEDULE)
// ==============================================================================

#[axum::debug_handler]
pub async fn add_interval(
    State(state): State<DoctorCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<AddIntervalRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;
    let doctor_id = user.uuid()?;
    let weekday = weekday_from_index(request.day_of_week)?;

    let intervals = state.registry
        .add_interval(doctor_id, weekday, request.from, request.to)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": request.day_of_week,
        "intervals": intervals
    })))
}

#[axum::debug_handler]
pub async fn remove_day(
    State(state): State<DoctorCellState>,
    Extension(user): Extension<User>,
    Path(day_of_week): Path<u8>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;
    let doctor_id = user.uuid()?;
    let weekday = weekday_from_index(day_of_week)?;

    state.registry.remove_day(doctor_id, weekday).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": day_of_week,
        "intervals": []
    })))
}

#[axum::debug_handler]
pub async fn remove_interval(
    State(state): State<DoctorCellState>,
    Extension(user): Extension<User>,
    Path((day_of_week, from)): Path<(u8, String)>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;
    let doctor_id = user.uuid()?;
    let weekday = weekday_from_index(day_of_week)?;
    let from = parse_wall_clock(&from)?;

    let intervals = state.registry.remove_interval(doctor_id, weekday, from).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": day_of_week,
        "intervals": intervals
    })))
}
