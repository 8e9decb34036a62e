//! # Video Conferencing Cell
//!
//! WebRTC signaling for consultation rooms. Each room is keyed by an
//! appointment's room code and admits that appointment's patient and doctor
//! while it is in progress. Offers, answers and ICE candidates are relayed
//! as opaque JSON; media never passes through the server.
//!
//! ```text
//! handlers.rs            GET /ws upgrade and socket pump
//! services/directory.rs  room code -> two participants
//! services/relay.rs      per-connection outbound queues
//! services/session.rs    frame dispatch for one connection
//! ```

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::SignalingState;
pub use models::*;
pub use router::signaling_routes;
pub use services::*;
