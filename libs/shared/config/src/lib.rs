use std::env;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ROOM_IDLE_TIMEOUT_SECS: u64 = 900;
const DEFAULT_ROOM_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_SIGNALING_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub port: u16,
    /// How long a room may wait with a single occupant before it is torn down.
    pub room_idle_timeout_secs: u64,
    pub room_sweep_interval_secs: u64,
    /// Outbound events buffered per signaling connection before new ones are dropped.
    pub signaling_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: parse_or_default("PORT", DEFAULT_PORT),
            room_idle_timeout_secs: parse_or_default(
                "ROOM_IDLE_TIMEOUT_SECS",
                DEFAULT_ROOM_IDLE_TIMEOUT_SECS,
            ),
            room_sweep_interval_secs: parse_or_default(
                "ROOM_SWEEP_INTERVAL_SECS",
                DEFAULT_ROOM_SWEEP_INTERVAL_SECS,
            ),
            signaling_queue_capacity: parse_or_default(
                "SIGNALING_QUEUE_CAPACITY",
                DEFAULT_SIGNALING_QUEUE_CAPACITY,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Whether the Supabase document store can be used.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            port: DEFAULT_PORT,
            room_idle_timeout_secs: DEFAULT_ROOM_IDLE_TIMEOUT_SECS,
            room_sweep_interval_secs: DEFAULT_ROOM_SWEEP_INTERVAL_SECS,
            signaling_queue_capacity: DEFAULT_SIGNALING_QUEUE_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Idle TTL for single-occupant rooms. Values too large for a
    /// `chrono::Duration` fall back to the default.
    pub fn room_idle_timeout(&self) -> chrono::Duration {
        i64::try_from(self.room_idle_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| {
                warn!(
                    "ROOM_IDLE_TIMEOUT_SECS value {} is out of range, using default {}",
                    self.room_idle_timeout_secs, DEFAULT_ROOM_IDLE_TIMEOUT_SECS
                );
                chrono::Duration::seconds(DEFAULT_ROOM_IDLE_TIMEOUT_SECS as i64)
            })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
