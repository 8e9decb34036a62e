use axum::{
    Router,
    routing::{get, post, delete},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, DoctorCellState};

pub fn doctor_routes(state: DoctorCellState) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_weekly_availability))
        .route("/{doctor_id}/availability/{day}", get(handlers::get_day_availability));

    // The calling doctor's own schedule
    let protected_routes = Router::new()
        .route("/availability", post(handlers::add_interval))
        .route("/availability/{day}", delete(handlers::remove_day))
        .route("/availability/{day}/{from}", delete(handlers::remove_interval))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
