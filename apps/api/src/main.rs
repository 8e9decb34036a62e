use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentCellState, AppointmentLifecycle, AppointmentStore, BookingScheduler,
    InMemoryAppointmentStore, SupabaseAppointmentStore,
};
use doctor_cell::{
    AvailabilityStore, DoctorCellState, InMemoryAvailabilityStore, SlotRegistry,
    SupabaseAvailabilityStore,
};
use shared_config::AppConfig;
use video_conferencing_cell::{RoomDirectory, SignalingRelay, SignalingState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Telecare API server");

    let config = Arc::new(AppConfig::from_env());

    let (availability_store, appointment_store): (Arc<dyn AvailabilityStore>, Arc<dyn AppointmentStore>) =
        if config.is_configured() {
            (
                Arc::new(SupabaseAvailabilityStore::new(&config)),
                Arc::new(SupabaseAppointmentStore::new(&config)),
            )
        } else {
            warn!("Supabase is not configured, falling back to in-memory stores");
            (
                Arc::new(InMemoryAvailabilityStore::new()),
                Arc::new(InMemoryAppointmentStore::new()),
            )
        };

    let registry = Arc::new(SlotRegistry::new(availability_store));
    let scheduler = Arc::new(BookingScheduler::new(appointment_store.clone()).with_availability(registry.clone()));
    let lifecycle = Arc::new(AppointmentLifecycle::new(appointment_store));
    let relay = Arc::new(SignalingRelay::new(Arc::new(RoomDirectory::new())));

    spawn_room_sweeper(relay.clone(), &config);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(
        DoctorCellState { config: config.clone(), registry },
        AppointmentCellState { config: config.clone(), scheduler, lifecycle: lifecycle.clone() },
        SignalingState { config: config.clone(), relay, lifecycle },
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new()
                .level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new()
                .level(Level::INFO)),
    )
    .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops rooms whose lone occupant has waited too long.
fn spawn_room_sweeper(relay: Arc<SignalingRelay>, config: &AppConfig) {
    let ttl = config.room_idle_timeout();
    let period = Duration::from_secs(config.room_sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            relay.sweep_idle(ttl);
        }
    });
}
