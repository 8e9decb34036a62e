use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveTime, TimeZone, Utc, Weekday};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use appointment_cell::services::{AppointmentLifecycle, BookingScheduler, InMemoryAppointmentStore};
use doctor_cell::services::{InMemoryAvailabilityStore, SlotRegistry};
use shared_models::auth::Role;
use video_conferencing_cell::models::ServerEvent;
use video_conferencing_cell::services::{RoomDirectory, SignalingRelay, SignalingSession};

struct Clinic {
    registry: Arc<SlotRegistry>,
    scheduler: BookingScheduler,
    lifecycle: Arc<AppointmentLifecycle>,
    relay: Arc<SignalingRelay>,
}

impl Clinic {
    fn new() -> Self {
        let registry = Arc::new(SlotRegistry::new(Arc::new(InMemoryAvailabilityStore::new())));
        let store = Arc::new(InMemoryAppointmentStore::new());
        Self {
            scheduler: BookingScheduler::new(store.clone()).with_availability(registry.clone()),
            registry,
            lifecycle: Arc::new(AppointmentLifecycle::new(store)),
            relay: Arc::new(SignalingRelay::new(Arc::new(RoomDirectory::new()))),
        }
    }

    fn connect(&self, user_id: Uuid, role: Role) -> (SignalingSession, mpsc::Receiver<ServerEvent>) {
        let (tx, mut rx) = mpsc::channel(16);
        let session = SignalingSession::open(self.relay.clone(), self.lifecycle.clone(), user_id, role, tx);
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::Connected { socket_id: session.connection_id() });
        (session, rx)
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

// 2024-06-03 is a Monday
fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, hour, minute, 0).unwrap()
}

fn join_frame(room: &str) -> String {
    json!({"event": "join-room", "data": {"room": room}}).to_string()
}

fn error_code(event: ServerEvent) -> String {
    match event {
        ServerEvent::Error { code, .. } => code,
        other => panic!("expected error frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_consultation_from_booking_to_completion() {
    let clinic = Clinic::new();
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let other_patient = Uuid::new_v4();

    clinic.registry.add_interval(doctor, Weekday::Mon, hm(9, 0), hm(10, 0)).await.unwrap();

    let appointment = clinic.scheduler.book(patient, doctor, monday(9, 0), monday(9, 30)).await.unwrap();
    assert_matches!(
        clinic.scheduler.book(other_patient, doctor, monday(9, 0), monday(9, 15)).await,
        Err(AppointmentError::SlotTaken)
    );

    let (patient_session, mut patient_rx) = clinic.connect(patient, Role::User);
    let (doctor_session, mut doctor_rx) = clinic.connect(doctor, Role::Doctor);

    patient_session.handle_text(&join_frame(&appointment.room_code)).await;
    assert!(patient_rx.try_recv().is_err());

    doctor_session.handle_text(&join_frame(&appointment.room_code)).await;
    assert_matches!(
        patient_rx.try_recv().unwrap(),
        ServerEvent::OtherUser { socket_id, user_id, role: Role::Doctor, .. }
            if socket_id == doctor_session.connection_id() && user_id == doctor
    );
    assert!(doctor_rx.try_recv().is_err());

    let offer = json!({"event": "send-signal", "data": {
        "socket_id": doctor_session.connection_id(),
        "signal": {"type": "offer", "sdp": "v=0"}
    }});
    patient_session.handle_text(&offer.to_string()).await;
    assert_eq!(
        doctor_rx.try_recv().unwrap(),
        ServerEvent::ReceivingSignal {
            signal: json!({"type": "offer", "sdp": "v=0"}),
            sender: patient_session.connection_id(),
        }
    );

    let answer = json!({"event": "re-send-signal", "data": {
        "socket_id": patient_session.connection_id(),
        "signal": {"type": "answer"}
    }});
    doctor_session.handle_text(&answer.to_string()).await;
    assert_matches!(patient_rx.try_recv().unwrap(), ServerEvent::ReReceivingSignal { .. });

    clinic.lifecycle.write_medical_record(doctor, appointment.id).await.unwrap();

    let doctor_socket = doctor_session.connection_id();
    doctor_session.close();
    assert_eq!(patient_rx.try_recv().unwrap(), ServerEvent::UserLeave { socket_id: doctor_socket });

    patient_session.handle_text(r#"{"event":"leave-room"}"#).await;
    patient_session.handle_text(&join_frame(&appointment.room_code)).await;
    match patient_rx.try_recv().unwrap() {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, "FORBIDDEN");
            assert_eq!(message, "denied");
        }
        other => panic!("expected denial, got {:?}", other),
    }
    assert_eq!(clinic.relay.directory().room_count(), 0);
}

#[tokio::test]
async fn test_strangers_and_third_parties_are_turned_away() {
    let clinic = Clinic::new();
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4();
    clinic.registry.add_interval(doctor, Weekday::Mon, hm(9, 0), hm(10, 0)).await.unwrap();
    let appointment = clinic.scheduler.book(patient, doctor, monday(9, 0), monday(9, 30)).await.unwrap();

    let (stranger, mut stranger_rx) = clinic.connect(Uuid::new_v4(), Role::User);
    stranger.handle_text(&join_frame(&appointment.room_code)).await;
    assert_eq!(error_code(stranger_rx.try_recv().unwrap()), "FORBIDDEN");

    stranger.handle_text(&join_frame("no-such-room")).await;
    assert_eq!(error_code(stranger_rx.try_recv().unwrap()), "FORBIDDEN");

    // A second socket of the patient is refused and leaves the doctor's seat free
    let (first, _first_rx) = clinic.connect(patient, Role::User);
    let (second_device, mut second_device_rx) = clinic.connect(patient, Role::User);
    let (doctor_session, _doctor_rx) = clinic.connect(doctor, Role::Doctor);
    first.handle_text(&join_frame(&appointment.room_code)).await;
    second_device.handle_text(&join_frame(&appointment.room_code)).await;
    assert_eq!(error_code(second_device_rx.try_recv().unwrap()), "CONFLICT");

    doctor_session.handle_text(&join_frame(&appointment.room_code)).await;
    let occupants = clinic.relay.directory().occupants(&appointment.room_code);
    assert_eq!(occupants.len(), 2);
    assert!(occupants.iter().any(|p| p.user_id == doctor));
}

#[tokio::test]
async fn test_bad_frames_get_error_replies() {
    let clinic = Clinic::new();
    let (session, mut rx) = clinic.connect(Uuid::new_v4(), Role::User);

    session.handle_text("{not json").await;
    assert_eq!(error_code(rx.try_recv().unwrap()), "VALIDATION_ERROR");

    session.handle_text(r#"{"event":"shout","data":{}}"#).await;
    assert_eq!(error_code(rx.try_recv().unwrap()), "VALIDATION_ERROR");

    let orphan = json!({"event": "send-signal", "data": {"socket_id": Uuid::new_v4(), "signal": {}}});
    session.handle_text(&orphan.to_string()).await;
    assert_eq!(error_code(rx.try_recv().unwrap()), "NOT_FOUND");

    session.close();
    assert_eq!(clinic.relay.connection_count(), 0);
}
