use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentCellState};

pub fn appointment_routes(state: AppointmentCellState) -> Router {
    let public_routes = Router::new()
        .route("/booked/{doctor_id}", get(handlers::get_booked_slots));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/chart", get(handlers::get_chart))
        .route("/rooms/{room_code}/access", get(handlers::check_room_access))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/medical-record", post(handlers::write_medical_record))
        .route("/{appointment_id}/rating", post(handlers::rate_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
