use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, StatusUpdate};
use crate::services::store::AppointmentStore;

pub struct AppointmentLifecycle {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentLifecycle {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Validate that a status transition is allowed
    pub fn validate_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if Self::valid_transitions(current).contains(&next) {
            debug!("Status transition validated: {} -> {}", current, next);
            Ok(())
        } else {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            Err(AppointmentError::InvalidStatusTransition(current))
        }
    }

    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Progress => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn apply(
        &self,
        appointment: &Appointment,
        update: StatusUpdate,
    ) -> Result<Appointment, AppointmentError> {
        Self::validate_transition(appointment.status, update.status)?;

        match self.store.transition(appointment.id, appointment.status, update).await? {
            Some(updated) => Ok(updated),
            None => {
                // Lost a race against another transition; report what it became
                let current = self.load(appointment.id).await?;
                warn!("Appointment {} changed concurrently to {}", appointment.id, current.status);
                Err(AppointmentError::InvalidStatusTransition(current.status))
            }
        }
    }

    /// Progress -> Completed, marking the medical record as written.
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let now = Utc::now();

        let completed = self.apply(&appointment, StatusUpdate {
            status: AppointmentStatus::Completed,
            completed_at: Some(now),
            medical_record_written: true,
        }).await?;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    pub async fn write_medical_record(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if appointment.doctor_id != doctor_id {
            warn!("User {} tried to write the record of appointment {}", doctor_id, appointment_id);
            return Err(AppointmentError::Unauthorized);
        }

        self.complete(appointment_id).await
    }

    pub async fn cancel(&self, user_id: Uuid, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !appointment.is_participant(user_id) {
            return Err(AppointmentError::Unauthorized);
        }

        let cancelled = self.apply(&appointment, StatusUpdate {
            status: AppointmentStatus::Cancelled,
            completed_at: None,
            medical_record_written: appointment.medical_record_written,
        }).await?;

        info!("Appointment {} cancelled by {}", appointment_id, user_id);
        Ok(cancelled)
    }

    /// Stores a 1..=5 rating whatever the appointment's status.
    pub async fn rate(&self, appointment_id: Uuid, rating: u8) -> Result<Appointment, AppointmentError> {
        if !(1..=5).contains(&rating) {
            return Err(AppointmentError::InvalidRating(rating));
        }

        let rated = self.store
            .set_rating(appointment_id, rating)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} rated {}", appointment_id, rating);
        Ok(rated)
    }

    pub async fn rate_as_patient(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        rating: u8,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if appointment.patient_id != patient_id {
            return Err(AppointmentError::Unauthorized);
        }

        self.rate(appointment_id, rating).await
    }

    /// Resolves a room code for one of its two participants while the
    /// appointment is in progress. Every refusal is the same opaque error.
    pub async fn room_access(&self, user_id: Uuid, room_code: &str) -> Result<Appointment, AppointmentError> {
        let appointment = match self.store.find_by_room_code(room_code).await? {
            Some(appointment) => appointment,
            None => {
                debug!("Unknown room code requested by {}", user_id);
                return Err(AppointmentError::RoomAccessDenied);
            }
        };

        if appointment.status != AppointmentStatus::Progress || !appointment.is_participant(user_id) {
            debug!("Room access denied for {} on appointment {}", user_id, appointment.id);
            return Err(AppointmentError::RoomAccessDenied);
        }

        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use AppointmentStatus::*;

        assert!(AppointmentLifecycle::validate_transition(Progress, Completed).is_ok());
        assert!(AppointmentLifecycle::validate_transition(Progress, Cancelled).is_ok());

        for terminal in [Completed, Cancelled] {
            for next in [Progress, Completed, Cancelled] {
                assert!(matches!(
                    AppointmentLifecycle::validate_transition(terminal, next),
                    Err(AppointmentError::InvalidStatusTransition(s)) if s == terminal
                ));
            }
        }
        assert!(AppointmentLifecycle::validate_transition(Progress, Progress).is_err());
    }
}
