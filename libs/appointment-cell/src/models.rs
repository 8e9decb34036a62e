use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_code: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub rating: Option<u8>,
    pub medical_record_written: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    /// Half-open intersection; back-to-back ranges do not overlap.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.from < to && from < self.to
    }

    pub fn counterpart_of(&self, user_id: Uuid) -> Uuid {
        if self.patient_id == user_id { self.doctor_id } else { self.patient_id }
    }
}

/// Stored as the exact strings `Progress`, `Completed`, `Cancelled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Progress,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Progress => write!(f, "Progress"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Public profile of the other party shown next to an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentListItem {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub counterpart: Option<UserProfile>,
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

/// Which side of the appointment the listing is keyed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListScope {
    #[serde(rename = "user")]
    Patient,
    #[serde(rename = "doctor")]
    Doctor,
}

impl ListScope {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Doctor => ListScope::Doctor,
            Role::Admin | Role::User => ListScope::Patient,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            ListScope::Patient => "patient_id",
            ListScope::Doctor => "doctor_id",
        }
    }
}

/// Time/status slice requested by a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    Upcoming,
    Past,
    Cancelled,
}

impl ListFilter {
    pub fn from_status(status: Option<AppointmentStatus>) -> Self {
        match status {
            Some(AppointmentStatus::Completed) => ListFilter::Past,
            Some(AppointmentStatus::Cancelled) => ListFilter::Cancelled,
            Some(AppointmentStatus::Progress) | None => ListFilter::Upcoming,
        }
    }

    pub fn ascending(&self) -> bool {
        matches!(self, ListFilter::Upcoming)
    }

    pub fn matches(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        match self {
            ListFilter::Upcoming => appointment.from >= now,
            ListFilter::Past => appointment.from < now,
            ListFilter::Cancelled => appointment.status == AppointmentStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppointmentQuery {
    pub scope: ListScope,
    pub user_id: Uuid,
    pub filter: ListFilter,
    pub now: DateTime<Utc>,
    pub skip: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeline {
    #[default]
    Week,
    Month,
    Year,
}

impl Timeline {
    pub fn days(&self) -> i64 {
        match self {
            Timeline::Week => 7,
            Timeline::Month => 30,
            Timeline::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
}

/// Fields written when an appointment leaves `Progress`.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub medical_record_written: bool,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    pub option: Option<AppointmentStatus>,
    pub by: Option<ListScope>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BookedQuery {
    pub reference: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub timeline: Option<Timeline>,
}

#[derive(Debug, Deserialize)]
pub struct RateAppointmentRequest {
    pub rating: u8,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment slot not available")]
    SlotTaken,

    #[error("Doctor not available at requested time")]
    OutsideAvailability,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    /// Room entry refusal; carries no detail about why.
    #[error("denied")]
    RoomAccessDenied,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AppointmentError::SlotTaken,
            StoreError::NotFound(_) => AppointmentError::NotFound,
            StoreError::Backend(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotTaken
            | AppointmentError::OutsideAvailability
            | AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidTime(_)
            | AppointmentError::InvalidRating(_)
            | AppointmentError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::Unauthorized | AppointmentError::RoomAccessDenied => {
                AppError::Forbidden(err.to_string())
            }
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
