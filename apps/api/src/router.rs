use axum::{
    Router,
    routing::get,
};

use appointment_cell::{router::appointment_routes, AppointmentCellState};
use doctor_cell::{router::doctor_routes, DoctorCellState};
use video_conferencing_cell::{signaling_routes, SignalingState};

pub fn create_router(
    doctors: DoctorCellState,
    appointments: AppointmentCellState,
    signaling: SignalingState,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Telecare API is running!" }))
        .nest("/doctors", doctor_routes(doctors))
        .nest("/appointments", appointment_routes(appointments))
        .merge(signaling_routes(signaling))
}
