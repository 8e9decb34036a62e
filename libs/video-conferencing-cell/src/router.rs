use axum::{routing::get, Router};

use crate::handlers::{ws_handler, SignalingState};

/// The socket authenticates its own handshake, so there is no auth layer here.
pub fn signaling_routes(state: SignalingState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}
