use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, ListFilter, ListScope, StatusUpdate, UserProfile,
};

/// Persistence for appointments and the participant profiles shown with them.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with `StoreError::Conflict` when the backend's own overlap guard rejects the row.
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_room_code(&self, room_code: &str) -> Result<Option<Appointment>, StoreError>;

    /// Non-cancelled appointments of the doctor intersecting `[from, to)`.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Appointments of the doctor starting in `[start, end)`, ascending by start.
    async fn list_doctor_window(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_cancelled: bool,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// One page of a participant's appointments plus the total match count.
    async fn query(&self, query: &AppointmentQuery) -> Result<(Vec<Appointment>, u64), StoreError>;

    /// Applies `update` only while the stored status still equals `expected`.
    /// Returns `None` when no row matched.
    async fn transition(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> Result<Option<Appointment>, StoreError>;

    async fn set_rating(&self, id: Uuid, rating: u8) -> Result<Option<Appointment>, StoreError>;

    async fn load_profiles(&self, ids: &[Uuid]) -> Result<Vec<UserProfile>, StoreError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn encode_time(time: DateTime<Utc>) -> String {
        urlencoding::encode(&time.to_rfc3339()).into_owned()
    }

    async fn first(&self, path: &str) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn patch(&self, path: &str, body: serde_json::Value) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            path,
            None,
            Some(body),
            Some(Self::representation()),
        ).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let body = serde_json::to_value(appointment)?;
        let _: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(body),
            Some(Self::representation()),
        ).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.first(&format!("/rest/v1/appointments?id=eq.{}", id)).await
    }

    async fn find_by_room_code(&self, room_code: &str) -> Result<Option<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?room_code=eq.{}",
            urlencoding::encode(room_code)
        );
        self.first(&path).await
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=neq.Cancelled&from=lt.{}&to=gt.{}",
            doctor_id,
            Self::encode_time(to),
            Self::encode_time(from)
        );

        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows)
    }

    async fn list_doctor_window(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_cancelled: bool,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&from=gte.{}&from=lt.{}&order=from.asc",
            doctor_id,
            Self::encode_time(start),
            Self::encode_time(end)
        );
        if !include_cancelled {
            path.push_str("&status=neq.Cancelled");
        }

        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;
        debug!("Doctor {} has {} appointments in window", doctor_id, rows.len());
        Ok(rows)
    }

    async fn query(&self, query: &AppointmentQuery) -> Result<(Vec<Appointment>, u64), StoreError> {
        let filter = match query.filter {
            ListFilter::Upcoming => format!("from=gte.{}", Self::encode_time(query.now)),
            ListFilter::Past => format!("from=lt.{}", Self::encode_time(query.now)),
            ListFilter::Cancelled => "status=eq.Cancelled".to_string(),
        };
        let order = if query.filter.ascending() { "asc" } else { "desc" };

        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&{}&order=from.{}&offset={}&limit={}",
            query.scope.column(),
            query.user_id,
            filter,
            order,
            query.skip,
            query.limit
        );

        let result = self.supabase.request_with_count(&path, None).await?;
        Ok(result)
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> Result<Option<Appointment>, StoreError> {
        // The status filter makes the PATCH a compare-and-set
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let body = json!({
            "status": update.status,
            "completed_at": update.completed_at,
            "medical_record_written": update.medical_record_written,
        });

        self.patch(&path, body).await
    }

    async fn set_rating(&self, id: Uuid, rating: u8) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        self.patch(&path, json!({ "rating": rating })).await
    }

    async fn load_profiles(&self, ids: &[Uuid]) -> Result<Vec<UserProfile>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/profiles?id=in.({})&select=id,full_name,avatar_url", id_list);

        let profiles: Vec<UserProfile> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(profiles)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_profile(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut appointments = self.appointments.write().await;

        let clash = appointments.values().any(|existing| {
            existing.doctor_id == appointment.doctor_id
                && existing.status != AppointmentStatus::Cancelled
                && existing.overlaps(appointment.from, appointment.to)
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "doctor {} already booked in [{}, {})",
                appointment.doctor_id, appointment.from, appointment.to
            )));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_by_room_code(&self, room_code: &str) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments
            .read()
            .await
            .values()
            .find(|appointment| appointment.room_code == room_code)
            .cloned())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.appointments
            .read()
            .await
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.status != AppointmentStatus::Cancelled && a.overlaps(from, to))
            .cloned()
            .collect())
    }

    async fn list_doctor_window(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_cancelled: bool,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut rows: Vec<Appointment> = self.appointments
            .read()
            .await
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.from >= start && a.from < end)
            .filter(|a| include_cancelled || a.status != AppointmentStatus::Cancelled)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.from);
        Ok(rows)
    }

    async fn query(&self, query: &AppointmentQuery) -> Result<(Vec<Appointment>, u64), StoreError> {
        let mut rows: Vec<Appointment> = self.appointments
            .read()
            .await
            .values()
            .filter(|a| match query.scope {
                ListScope::Patient => a.patient_id == query.user_id,
                ListScope::Doctor => a.doctor_id == query.user_id,
            })
            .filter(|a| query.filter.matches(a, query.now))
            .cloned()
            .collect();

        if query.filter.ascending() {
            rows.sort_by_key(|a| a.from);
        } else {
            rows.sort_by(|a, b| b.from.cmp(&a.from));
        }

        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut appointments = self.appointments.write().await;

        match appointments.get_mut(&id) {
            Some(appointment) if appointment.status == expected => {
                appointment.status = update.status;
                appointment.completed_at = update.completed_at;
                appointment.medical_record_written = update.medical_record_written;
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_rating(&self, id: Uuid, rating: u8) -> Result<Option<Appointment>, StoreError> {
        let mut appointments = self.appointments.write().await;

        Ok(appointments.get_mut(&id).map(|appointment| {
            appointment.rating = Some(rating);
            appointment.clone()
        }))
    }

    async fn load_profiles(&self, ids: &[Uuid]) -> Result<Vec<UserProfile>, StoreError> {
        let profiles = self.profiles.read().await;
        Ok(ids.iter().filter_map(|id| profiles.get(id).cloned()).collect())
    }
}
