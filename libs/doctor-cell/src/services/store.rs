use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::DoctorAvailability;

/// Persistence for weekly availability, one record per (doctor, weekday).
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn load_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Option<DoctorAvailability>, StoreError>;

    /// All stored days for a doctor, Sunday first.
    async fn load_week(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, StoreError>;

    /// Insert or replace the record for `(doctor_id, day_of_week)`.
    async fn save_day(&self, record: &DoctorAvailability) -> Result<(), StoreError>;

    async fn delete_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<(), StoreError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseAvailabilityStore {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn load_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Option<DoctorAvailability>, StoreError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}",
            doctor_id, day_of_week
        );

        let rows: Vec<DoctorAvailability> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn load_week(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, StoreError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&order=day_of_week.asc",
            doctor_id
        );

        let rows: Vec<DoctorAvailability> = self.supabase.request(Method::GET, &path, None, None).await?;
        debug!("Loaded {} availability days for doctor {}", rows.len(), doctor_id);
        Ok(rows)
    }

    async fn save_day(&self, record: &DoctorAvailability) -> Result<(), StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let body = serde_json::to_value(record)?;
        let _: Vec<DoctorAvailability> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_availability?on_conflict=doctor_id,day_of_week",
            None,
            Some(body),
            Some(headers),
        ).await?;

        Ok(())
    }

    async fn delete_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<(), StoreError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}",
            doctor_id, day_of_week
        );

        self.supabase.execute(Method::DELETE, &path, None, None).await?;
        Ok(())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    days: RwLock<HashMap<(Uuid, u8), DoctorAvailability>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn load_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Option<DoctorAvailability>, StoreError> {
        Ok(self.days.read().await.get(&(doctor_id, day_of_week)).cloned())
    }

    async fn load_week(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, StoreError> {
        let days = self.days.read().await;
        let mut week: Vec<_> = days
            .values()
            .filter(|record| record.doctor_id == doctor_id)
            .cloned()
            .collect();
        week.sort_by_key(|record| record.day_of_week);
        Ok(week)
    }

    async fn save_day(&self, record: &DoctorAvailability) -> Result<(), StoreError> {
        self.days
            .write()
            .await
            .insert((record.doctor_id, record.day_of_week), record.clone());
        Ok(())
    }

    async fn delete_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<(), StoreError> {
        self.days.write().await.remove(&(doctor_id, day_of_week));
        Ok(())
    }
}
