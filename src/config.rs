//! Application Configuration
//! Mission: Every tunable lives here, injected at construction
//!
//! No module-level constants for limits or TTLs: tests construct a Config
//! with whatever values they need.

use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    /// Secret used to sign session tokens (HS256).
    pub jwt_secret: String,
    /// Session lifetime. Validation always rechecks expiry against the clock.
    pub session_ttl_hours: i64,
    /// bcrypt work factor for access-code hashes.
    pub bcrypt_cost: u32,
    /// Login attempts allowed per client key within one window.
    pub max_attempts: u32,
    /// Fixed rate-limit window. A new window starts only once this elapses.
    pub attempt_window: Duration,
    /// Deadline for a single login or calendar operation.
    pub op_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./villahost.db".to_string(),
            port: 8080,
            jwt_secret: "dev-secret-change-in-production-minimum-32-characters".to_string(),
            session_ttl_hours: 12,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            max_attempts: 5,
            attempt_window: Duration::from_secs(300),
            op_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| defaults.database_path.clone());

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let jwt_secret =
            std::env::var("JWT_SECRET").unwrap_or_else(|_| defaults.jwt_secret.clone());

        let session_ttl_hours = std::env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&v: &i64| v > 0)
            .unwrap_or(defaults.session_ttl_hours);

        let bcrypt_cost = std::env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&v| (4..=31).contains(&v))
            .unwrap_or(defaults.bcrypt_cost);

        let max_attempts = std::env::var("LOGIN_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(defaults.max_attempts);

        let attempt_window = std::env::var("LOGIN_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.attempt_window);

        let op_timeout = std::env::var("OP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.op_timeout);

        Ok(Self {
            database_path,
            port,
            jwt_secret,
            session_ttl_hours,
            bcrypt_cost,
            max_attempts,
            attempt_window,
            op_timeout,
        })
    }
}
