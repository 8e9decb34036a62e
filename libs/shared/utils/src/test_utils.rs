use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the Supabase client at a mock server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    /// Patients carry the plain `user` role.
    pub fn patient(email: &str) -> Self {
        Self::new(email, "user")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test user ids are generated uuids")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        }), secret)
    }

    /// Supabase-shaped token: top-level role is the Postgres role, clinic role in app_metadata.
    pub fn create_token_with_app_role(user: &TestUser, db_role: &str, app_role: &str, secret: &str) -> String {
        let now = Utc::now();

        Self::sign(json!({
            "sub": user.id,
            "email": user.email,
            "role": db_role,
            "app_metadata": { "role": app_role },
            "iat": now.timestamp(),
            "exp": (now + Duration::hours(1)).timestamp()
        }), secret)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    fn sign(payload: serde_json::Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }
}

/// PostgREST row shapes for wiremock-backed store tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn profile_row(user_id: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "full_name": full_name,
            "avatar_url": null
        })
    }

    pub fn availability_row(doctor_id: &str, day_of_week: u8, intervals: &[(&str, &str)]) -> serde_json::Value {
        let intervals: Vec<_> = intervals
            .iter()
            .map(|(from, to)| json!({ "from": from, "to": to }))
            .collect();

        json!({
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "intervals": intervals,
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        patient_id: &str,
        doctor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "room_code": "AbCdEfGh12345678",
            "from": from.to_rfc3339(),
            "to": to.to_rfc3339(),
            "status": status,
            "rating": null,
            "medical_record_written": false,
            "created_at": "2024-01-01T00:00:00Z",
            "completed_at": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}
