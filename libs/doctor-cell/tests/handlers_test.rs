use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use assert_matches::assert_matches;
use chrono::NaiveTime;
use uuid::Uuid;

use doctor_cell::handlers::*;
use doctor_cell::models::AddIntervalRequest;
use doctor_cell::services::{InMemoryAvailabilityStore, SlotRegistry};
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

fn create_test_state() -> DoctorCellState {
    DoctorCellState {
        config: TestConfig::default().to_arc(),
        registry: Arc::new(SlotRegistry::new(Arc::new(InMemoryAvailabilityStore::new()))),
    }
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn add_request(day_of_week: u8, from: NaiveTime, to: NaiveTime) -> Json<AddIntervalRequest> {
    Json(AddIntervalRequest { day_of_week, from, to })
}

#[tokio::test]
async fn test_doctor_adds_interval_and_public_can_read_it() {
    let state = create_test_state();
    let doctor = TestUser::doctor("doc@example.com");

    let Json(body) = add_interval(
        State(state.clone()),
        Extension(doctor.to_user()),
        add_request(1, t(9, 0), t(10, 0)),
    ).await.unwrap();
    assert_eq!(body["intervals"][0]["from"], "09:00");

    let Json(day) = get_day_availability(State(state.clone()), Path((doctor.uuid(), 1))).await.unwrap();
    assert_eq!(day["intervals"].as_array().unwrap().len(), 1);

    let Json(week) = get_weekly_availability(State(state), Path(doctor.uuid())).await.unwrap();
    assert_eq!(week["days"][0]["day_of_week"], 1);
}

#[tokio::test]
async fn test_patient_cannot_edit_availability() {
    let state = create_test_state();
    let patient = TestUser::patient("p@example.com");

    let result = add_interval(
        State(state),
        Extension(patient.to_user()),
        add_request(1, t(9, 0), t(10, 0)),
    ).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_overlap_and_validation_errors() {
    let state = create_test_state();
    let doctor = TestUser::doctor("doc@example.com");

    add_interval(State(state.clone()), Extension(doctor.to_user()), add_request(2, t(9, 0), t(10, 0)))
        .await
        .unwrap();

    let overlap = add_interval(State(state.clone()), Extension(doctor.to_user()), add_request(2, t(9, 30), t(11, 0))).await;
    assert_matches!(overlap, Err(AppError::Conflict(_)));

    let inverted = add_interval(State(state.clone()), Extension(doctor.to_user()), add_request(2, t(11, 0), t(10, 0))).await;
    assert_matches!(inverted, Err(AppError::ValidationError(_)));

    let bad_day = add_interval(State(state), Extension(doctor.to_user()), add_request(7, t(9, 0), t(10, 0))).await;
    assert_matches!(bad_day, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_remove_interval_by_start_time() {
    let state = create_test_state();
    let doctor = TestUser::doctor("doc@example.com");

    add_interval(State(state.clone()), Extension(doctor.to_user()), add_request(3, t(9, 0), t(10, 0)))
        .await
        .unwrap();
    add_interval(State(state.clone()), Extension(doctor.to_user()), add_request(3, t(13, 0), t(14, 0)))
        .await
        .unwrap();

    let missing = remove_interval(State(state.clone()), Extension(doctor.to_user()), Path((3, "12:00".to_string()))).await;
    assert_matches!(missing, Err(AppError::NotFound(_)));

    let Json(body) = remove_interval(State(state.clone()), Extension(doctor.to_user()), Path((3, "09:00".to_string())))
        .await
        .unwrap();
    assert_eq!(body["intervals"].as_array().unwrap().len(), 1);

    remove_day(State(state.clone()), Extension(doctor.to_user()), Path(3)).await.unwrap();
    let Json(week) = get_weekly_availability(State(state), Path(Uuid::parse_str(&doctor.id).unwrap())).await.unwrap();
    assert!(week["days"].as_array().unwrap().is_empty());
}
