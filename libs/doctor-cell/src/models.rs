use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Half-open wall-clock range `[from, to)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    #[serde(with = "wall_clock")]
    pub from: NaiveTime,
    #[serde(with = "wall_clock")]
    pub to: NaiveTime,
}

impl Interval {
    pub fn new(from: NaiveTime, to: NaiveTime) -> Result<Self, AvailabilityError> {
        if from >= to {
            return Err(AvailabilityError::InvalidInterval(format!(
                "start {} must be before end {}",
                from.format("%H:%M"),
                to.format("%H:%M")
            )));
        }
        Ok(Self { from, to })
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.from < other.to && other.from < self.to
    }

    pub fn covers(&self, from: NaiveTime, to: NaiveTime) -> bool {
        self.from <= from && to <= self.to
    }
}

/// Stored weekly availability for one (doctor, weekday) bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub doctor_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub intervals: Vec<Interval>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AddIntervalRequest {
    pub day_of_week: u8,
    #[serde(with = "wall_clock")]
    pub from: NaiveTime,
    #[serde(with = "wall_clock")]
    pub to: NaiveTime,
}

pub fn weekday_from_index(day_of_week: u8) -> Result<Weekday, AvailabilityError> {
    match day_of_week {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(AvailabilityError::InvalidWeekday(other)),
    }
}

pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_wall_clock(value: &str) -> Result<NaiveTime, AvailabilityError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| AvailabilityError::InvalidInterval(format!("invalid time of day: {}", value)))
}

/// Serde adapter writing `HH:MM` and reading `HH:MM` or `HH:MM:SS`.
pub mod wall_clock {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wall_clock(&raw).map_err(de::Error::custom)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidWeekday(u8),

    #[error("Interval {from}-{to} overlaps an existing interval")]
    Overlap { from: NaiveTime, to: NaiveTime },

    #[error("No interval starts at {0}")]
    IntervalNotFound(NaiveTime),

    #[error("Stored availability is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidInterval(_) | AvailabilityError::InvalidWeekday(_) => {
                AppError::ValidationError(err.to_string())
            }
            AvailabilityError::Overlap { .. } => AppError::Conflict(err.to_string()),
            AvailabilityError::IntervalNotFound(_) => AppError::NotFound(err.to_string()),
            AvailabilityError::Corrupt(msg) => AppError::Internal(msg),
            AvailabilityError::Store(StoreError::Conflict(msg)) => AppError::Conflict(msg),
            AvailabilityError::Store(StoreError::NotFound(msg)) => AppError::NotFound(msg),
            AvailabilityError::Store(StoreError::Backend(msg)) => AppError::Database(msg),
        }
    }
}
