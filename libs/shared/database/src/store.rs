use thiserror::Error;

use crate::supabase::SupabaseError;

/// Failure reported by a persistence adapter, independent of the backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness or exclusion constraint rejected the write.
    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store backend failure: {0}")]
    Backend(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(msg) => StoreError::Conflict(msg),
            SupabaseError::NotFound(msg) => StoreError::NotFound(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("Malformed row: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supabase_errors_map_to_store_errors() {
        let conflict: StoreError = SupabaseError::Conflict("duplicate key".into()).into();
        assert!(matches!(conflict, StoreError::Conflict(_)));

        let api: StoreError = SupabaseError::Api { status: 500, body: "boom".into() }.into();
        assert!(matches!(api, StoreError::Backend(msg) if msg.contains("boom")));
    }
}
