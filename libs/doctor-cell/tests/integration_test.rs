use std::sync::Arc;

use axum::{body::Body, http::{Request, StatusCode}};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use doctor_cell::handlers::DoctorCellState;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::{AvailabilityStore, InMemoryAvailabilityStore, SlotRegistry, SupabaseAvailabilityStore};
use doctor_cell::models::DoctorAvailability;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn in_memory_state(config: &TestConfig) -> DoctorCellState {
    DoctorCellState {
        config: config.to_arc(),
        registry: Arc::new(SlotRegistry::new(Arc::new(InMemoryAvailabilityStore::new()))),
    }
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_router_requires_token_for_edits() {
    let config = TestConfig::default();
    let app = doctor_routes(in_memory_state(&config));

    let response = app
        .oneshot(
            Request::post("/availability")
                .header("content-type", "application/json")
                .body(Body::from(json!({"day_of_week": 1, "from": "09:00", "to": "10:00"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_router_add_then_read_back() {
    let config = TestConfig::default();
    let app = doctor_routes(in_memory_state(&config));
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let response = app.clone()
        .oneshot(
            Request::post("/availability")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(json!({"day_of_week": 4, "from": "09:00", "to": "10:30"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone()
        .oneshot(
            Request::post("/availability")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(json!({"day_of_week": 4, "from": "10:00", "to": "11:00"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(
            Request::get(format!("/{}/availability/4", doctor.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["intervals"], json!([{"from": "09:00", "to": "10:30"}]));
}

#[tokio::test]
async fn test_supabase_store_reads_day() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("day_of_week", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_row(&doctor.id, 1, &[("09:00", "10:00"), ("13:00:00", "14:00:00")])
        ])))
        .mount(&mock_server)
        .await;

    let store = SupabaseAvailabilityStore::new(&config.to_app_config());
    let day = store.load_day(doctor.uuid(), 1).await.unwrap().unwrap();

    assert_eq!(day.intervals.len(), 2);
    assert_eq!(day.intervals[1].from.format("%H:%M").to_string(), "13:00");
}

#[tokio::test]
async fn test_supabase_store_upserts_day() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let row = MockSupabaseResponses::availability_row(&doctor.id, 2, &[("09:00", "10:00")]);

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("on_conflict", "doctor_id,day_of_week"))
        .and(body_partial_json(json!({"day_of_week": 2, "intervals": [{"from": "09:00", "to": "10:00"}]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row.clone()])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let record: DoctorAvailability = serde_json::from_value(row).unwrap();
    let store = SupabaseAvailabilityStore::new(&config.to_app_config());
    store.save_day(&record).await.unwrap();
}
