use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::AvailabilityChecker;
use shared_models::pagination::{Page, Pagination};

use crate::models::{
    Appointment, AppointmentError, AppointmentListItem, AppointmentQuery, AppointmentStatus,
    ChartData, ListFilter, ListScope, Timeline,
};
use crate::services::store::AppointmentStore;

const ROOM_CODE_LENGTH: usize = 16;

pub struct BookingScheduler {
    store: Arc<dyn AppointmentStore>,
    availability: Option<Arc<dyn AvailabilityChecker>>,
    doctor_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl BookingScheduler {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            availability: None,
            doctor_locks: DashMap::new(),
        }
    }

    /// Rejects bookings outside the doctor's published weekly availability.
    pub fn with_availability(mut self, checker: Arc<dyn AvailabilityChecker>) -> Self {
        self.availability = Some(checker);
        self
    }

    fn doctor_lock(&self, doctor_id: Uuid) -> Arc<Mutex<()>> {
        self.doctor_locks.entry(doctor_id).or_default().clone()
    }

    #[instrument(skip(self))]
    pub async fn book(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        if from >= to {
            return Err(AppointmentError::InvalidTime("start must be before end".to_string()));
        }
        if patient_id == doctor_id {
            return Err(AppointmentError::ValidationError("cannot book an appointment with yourself".to_string()));
        }

        if let Some(checker) = &self.availability {
            let covered = checker
                .covers(doctor_id, from, to)
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
            if !covered {
                warn!("Doctor {} has no availability covering {} - {}", doctor_id, from, to);
                return Err(AppointmentError::OutsideAvailability);
            }
        }

        let lock = self.doctor_lock(doctor_id);
        let _guard = lock.lock().await;

        let clashes = self.store.find_overlapping(doctor_id, from, to).await?;
        if !clashes.is_empty() {
            warn!("Slot {} - {} for doctor {} already taken by {}", from, to, doctor_id, clashes[0].id);
            return Err(AppointmentError::SlotTaken);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            room_code: generate_room_code(),
            from,
            to,
            status: AppointmentStatus::Progress,
            rating: None,
            medical_record_written: false,
            created_at: Utc::now(),
            completed_at: None,
        };

        self.store.insert(&appointment).await?;

        info!("Appointment {} booked with doctor {} at {}", appointment.id, doctor_id, from);
        Ok(appointment)
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Start times of the doctor's non-cancelled appointments in the
    /// Sunday-to-Saturday UTC week containing `reference`.
    pub async fn weekly_booked_starts(
        &self,
        doctor_id: Uuid,
        reference: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        let (week_start, week_end) = week_bounds(reference);

        let appointments = self.store
            .list_doctor_window(doctor_id, week_start, week_end, false)
            .await?;

        let mut starts: Vec<_> = appointments.into_iter().map(|a| a.from).collect();
        starts.sort();

        debug!("Doctor {} has {} bookings in week starting {}", doctor_id, starts.len(), week_start);
        Ok(starts)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        scope: ListScope,
        status_filter: Option<AppointmentStatus>,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<Page<AppointmentListItem>, AppointmentError> {
        let window = pagination.window();
        let query = AppointmentQuery {
            scope,
            user_id,
            filter: ListFilter::from_status(status_filter),
            now,
            skip: window.skip,
            limit: window.size,
        };

        let (appointments, total_records) = self.store.query(&query).await?;

        let mut counterpart_ids: Vec<Uuid> = appointments.iter().map(|a| a.counterpart_of(user_id)).collect();
        counterpart_ids.sort();
        counterpart_ids.dedup();

        let profiles: HashMap<Uuid, _> = self.store
            .load_profiles(&counterpart_ids)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

        let data = appointments
            .into_iter()
            .map(|appointment| {
                let counterpart = profiles.get(&appointment.counterpart_of(user_id)).cloned();
                AppointmentListItem { appointment, counterpart }
            })
            .collect();

        Ok(Page {
            data,
            total_records,
            page: window.page,
            size: window.size,
        })
    }

    /// Appointments per calendar day over the trailing window ending today, oldest first.
    pub async fn chart_by_day(
        &self,
        doctor_id: Uuid,
        timeline: Timeline,
        now: DateTime<Utc>,
    ) -> Result<ChartData, AppointmentError> {
        let today = now.date_naive();
        let first_day = today - Duration::days(timeline.days() - 1);

        let appointments = self.store
            .list_doctor_window(doctor_id, start_of_day(first_day), start_of_day(today + Duration::days(1)), true)
            .await?;

        let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
        for appointment in &appointments {
            *per_day.entry(appointment.from.date_naive()).or_insert(0) += 1;
        }

        let (labels, counts): (Vec<String>, Vec<u64>) = first_day
            .iter_days()
            .take(timeline.days() as usize)
            .map(|day| (day.format("%Y-%m-%d").to_string(), per_day.get(&day).copied().unwrap_or(0)))
            .unzip();

        Ok(ChartData { labels, counts })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// `[sunday 00:00, next sunday 00:00)` in UTC around `reference`.
pub fn week_bounds(reference: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = reference.weekday().num_days_from_sunday() as i64;
    let sunday = reference.date_naive() - Duration::days(offset);
    let week_start = start_of_day(sunday);
    (week_start, week_start + Duration::days(7))
}

fn generate_room_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_CODE_LENGTH)
        .map(char::from)
        .collect()
}
