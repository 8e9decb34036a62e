use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_models::pagination::{Page, Pagination};
use shared_utils::extractor::require_role;

use crate::models::{
    AppointmentListItem, BookAppointmentRequest, BookedQuery, ChartData, ChartQuery,
    ListAppointmentsQuery, ListScope, RateAppointmentRequest,
};
use crate::services::booking::week_bounds;
use crate::services::{AppointmentLifecycle, BookingScheduler};

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub scheduler: Arc<BookingScheduler>,
    pub lifecycle: Arc<AppointmentLifecycle>,
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_booked_slots(
    State(state): State<AppointmentCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<BookedQuery>,
) -> Result<Json<Value>, AppError> {
    let reference = query.reference.unwrap_or_else(Utc::now);
    let (week_start, week_end) = week_bounds(reference);

    let booked = state.scheduler.weekly_booked_starts(doctor_id, reference).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "week_start": week_start,
        "week_end": week_end,
        "booked": booked
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::User)?;
    let patient_id = user.uuid()?;

    let appointment = state.scheduler
        .book(patient_id, request.doctor_id, request.from, request.to)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Page<AppointmentListItem>>, AppError> {
    let user_id = user.uuid()?;
    let scope = query.by.unwrap_or_else(|| ListScope::for_role(user.role()));
    let pagination = Pagination { page: query.page, size: query.size };

    debug!("Listing {:?} appointments for {} as {:?}", query.option, user_id, scope);
    let page = state.scheduler
        .list(user_id, scope, query.option, pagination, Utc::now())
        .await?;

    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_chart(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartData>, AppError> {
    require_role(&user, Role::Doctor)?;
    let doctor_id = user.uuid()?;

    let chart = state.scheduler
        .chart_by_day(doctor_id, query.timeline.unwrap_or_default(), Utc::now())
        .await?;

    Ok(Json(chart))
}

#[axum::debug_handler]
pub async fn check_room_access(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(room_code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user_id = user.uuid()?;
    let appointment = state.lifecycle.room_access(user_id, &room_code).await?;

    Ok(Json(json!({
        "appointment_id": appointment.id,
        "room_code": appointment.room_code,
        "from": appointment.from,
        "to": appointment.to
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_id = user.uuid()?;
    let appointment = state.scheduler.get(appointment_id).await?;

    if !appointment.is_participant(user_id) && !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn write_medical_record(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;
    let doctor_id = user.uuid()?;

    let appointment = state.lifecycle.write_medical_record(doctor_id, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn rate_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.uuid()?;

    let appointment = state.lifecycle
        .rate_as_patient(patient_id, appointment_id, request.rating)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_id = user.uuid()?;

    let appointment = state.lifecycle.cancel(user_id, appointment_id).await?;

    Ok(Json(json!(appointment)))
}
