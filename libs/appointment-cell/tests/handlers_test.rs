use std::sync::Arc;

use axum::{body::Body, http::{Request, StatusCode}, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::handlers::AppointmentCellState;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::{AppointmentLifecycle, BookingScheduler, InMemoryAppointmentStore};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_app(config: &TestConfig) -> Router {
    let store = Arc::new(InMemoryAppointmentStore::new());
    appointment_routes(AppointmentCellState {
        config: config.to_arc(),
        scheduler: Arc::new(BookingScheduler::new(store.clone())),
        lifecycle: Arc::new(AppointmentLifecycle::new(store)),
    })
}

fn bearer(user: &TestUser, config: &TestConfig) -> String {
    format!("Bearer {}", JwtTestUtils::create_test_token(user, &config.jwt_secret, Some(1)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn post_json(uri: &str, auth: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("Authorization", auth)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_booking_flow_over_http() {
    let config = TestConfig::default();
    let app = create_app(&config);
    let patient = TestUser::patient("p@example.com");
    let doctor = TestUser::doctor("d@example.com");
    let patient_auth = bearer(&patient, &config);
    let doctor_auth = bearer(&doctor, &config);

    let booking = json!({
        "doctor_id": doctor.id,
        "from": "2030-06-03T09:00:00Z",
        "to": "2030-06-03T09:30:00Z"
    });

    let (status, appointment) = send(&app, post_json("/", &patient_auth, booking.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appointment["status"], "Progress");
    let id = appointment["id"].as_str().unwrap().to_string();
    let code = appointment["room_code"].as_str().unwrap().to_string();

    let (status, _) = send(&app, post_json("/", &patient_auth, booking.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Doctors cannot book
    let (status, _) = send(&app, post_json("/", &doctor_auth, booking)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, booked) = send(
        &app,
        get(&format!("/booked/{}?reference=2030-06-05T00:00:00Z", doctor.id), None),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booked["booked"].as_array().unwrap().len(), 1);

    let (status, page) = send(&app, get("/?page=1&size=5", Some(&doctor_auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_records"], 1);
    assert_eq!(page["data"][0]["id"], id.as_str());

    let (status, _) = send(&app, get(&format!("/rooms/{}/access", code), Some(&patient_auth))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, rated) = send(&app, post_json(&format!("/{}/rating", id), &patient_auth, json!({"rating": 4}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rated["rating"], 4);

    let (status, _) = send(&app, post_json(&format!("/{}/medical-record", id), &patient_auth, json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, done) = send(&app, post_json(&format!("/{}/medical-record", id), &doctor_auth, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "Completed");

    let (status, _) = send(&app, post_json(&format!("/{}/medical-record", id), &doctor_auth, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, get(&format!("/rooms/{}/access", code), Some(&patient_auth))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "denied");
}

#[tokio::test]
async fn test_get_appointment_restricted_to_participants() {
    let config = TestConfig::default();
    let app = create_app(&config);
    let patient = TestUser::patient("p@example.com");
    let doctor = TestUser::doctor("d@example.com");
    let stranger = TestUser::patient("s@example.com");
    let admin = TestUser::admin("a@example.com");

    let (_, appointment) = send(&app, post_json("/", &bearer(&patient, &config), json!({
        "doctor_id": doctor.id,
        "from": "2030-06-03T10:00:00Z",
        "to": "2030-06-03T10:30:00Z"
    }))).await;
    let uri = format!("/{}", appointment["id"].as_str().unwrap());

    let (status, _) = send(&app, get(&uri, Some(&bearer(&stranger, &config)))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get(&uri, Some(&bearer(&admin, &config)))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/{}", uuid::Uuid::new_v4()), Some(&bearer(&doctor, &config)))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_chart_requires_doctor_role() {
    let config = TestConfig::default();
    let app = create_app(&config);

    let (status, _) = send(&app, get("/chart?timeline=month", Some(&bearer(&TestUser::patient("p@example.com"), &config)))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, chart) = send(&app, get("/chart?timeline=month", Some(&bearer(&TestUser::doctor("d@example.com"), &config)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chart["labels"].as_array().unwrap().len(), 30);
}
