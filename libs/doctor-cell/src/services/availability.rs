use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{weekday_index, AvailabilityError, DoctorAvailability, Interval};
use crate::services::interval_set::IntervalSet;
use crate::services::store::AvailabilityStore;

/// Answers whether a doctor has published availability for a concrete time range.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn covers(&self, doctor_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<bool, AvailabilityError>;
}

/// Owns every doctor's weekly intervals through an [`AvailabilityStore`].
///
/// Edits for one doctor are serialized so the load-insert-save sequence
/// cannot interleave with another edit of the same schedule.
pub struct SlotRegistry {
    store: Arc<dyn AvailabilityStore>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SlotRegistry {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    fn doctor_lock(&self, doctor_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(doctor_id).or_default().clone()
    }

    async fn load_set(&self, doctor_id: Uuid, day: u8) -> Result<IntervalSet, AvailabilityError> {
        match self.store.load_day(doctor_id, day).await? {
            Some(record) => IntervalSet::from_sorted(record.intervals),
            None => Ok(IntervalSet::new()),
        }
    }

    #[instrument(skip(self))]
    pub async fn add_interval(
        &self,
        doctor_id: Uuid,
        weekday: Weekday,
        from: NaiveTime,
        to: NaiveTime,
    ) -> Result<Vec<Interval>, AvailabilityError> {
        let interval = Interval::new(from, to)?;
        let day = weekday_index(weekday);

        let lock = self.doctor_lock(doctor_id);
        let _guard = lock.lock().await;

        let mut set = self.load_set(doctor_id, day).await?;
        if let Err(e) = set.insert(interval) {
            warn!("Rejected availability {}-{} for doctor {} on {}: overlap", from, to, doctor_id, weekday);
            return Err(e);
        }

        let record = DoctorAvailability {
            doctor_id,
            day_of_week: day,
            intervals: set.into_vec(),
            updated_at: Utc::now(),
        };
        self.store.save_day(&record).await?;

        info!("Doctor {} now has {} intervals on {}", doctor_id, record.intervals.len(), weekday);
        Ok(record.intervals)
    }

    /// Clears a whole weekday. Succeeds when nothing was stored.
    #[instrument(skip(self))]
    pub async fn remove_day(&self, doctor_id: Uuid, weekday: Weekday) -> Result<(), AvailabilityError> {
        let lock = self.doctor_lock(doctor_id);
        let _guard = lock.lock().await;

        self.store.delete_day(doctor_id, weekday_index(weekday)).await?;
        info!("Cleared availability for doctor {} on {}", doctor_id, weekday);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_interval(
        &self,
        doctor_id: Uuid,
        weekday: Weekday,
        from: NaiveTime,
    ) -> Result<Vec<Interval>, AvailabilityError> {
        let day = weekday_index(weekday);

        let lock = self.doctor_lock(doctor_id);
        let _guard = lock.lock().await;

        let mut set = self.load_set(doctor_id, day).await?;
        if !set.remove(from) {
            return Err(AvailabilityError::IntervalNotFound(from));
        }

        if set.is_empty() {
            self.store.delete_day(doctor_id, day).await?;
            info!("Removed last interval for doctor {} on {}", doctor_id, weekday);
            return Ok(Vec::new());
        }

        let record = DoctorAvailability {
            doctor_id,
            day_of_week: day,
            intervals: set.into_vec(),
            updated_at: Utc::now(),
        };
        self.store.save_day(&record).await?;

        info!("Removed interval at {} for doctor {} on {}", from, doctor_id, weekday);
        Ok(record.intervals)
    }

    pub async fn list_day(&self, doctor_id: Uuid, weekday: Weekday) -> Result<Vec<Interval>, AvailabilityError> {
        let set = self.load_set(doctor_id, weekday_index(weekday)).await?;
        debug!("Doctor {} has {} intervals on {}", doctor_id, set.len(), weekday);
        Ok(set.into_vec())
    }

    /// Non-empty days, Sunday through Saturday.
    pub async fn list_week(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        let mut week = self.store.load_week(doctor_id).await?;
        week.retain(|record| !record.intervals.is_empty());
        week.sort_by_key(|record| record.day_of_week);

        for record in &week {
            IntervalSet::from_sorted(record.intervals.clone())?;
        }

        Ok(week)
    }
}

#[async_trait]
impl AvailabilityChecker for SlotRegistry {
    async fn covers(&self, doctor_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<bool, AvailabilityError> {
        if from >= to || from.date_naive() != to.date_naive() {
            return Ok(false);
        }

        let set = self.load_set(doctor_id, weekday_index(from.weekday())).await?;
        Ok(set.contains_range(from.time(), to.time()))
    }
}
