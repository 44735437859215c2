//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::collections::HashSet;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;
use polls_core::RecencyWindow;
use tracing::Level;

/// Upper bound for the recency window settings, ten years in hours.
pub const MAX_RECENT_HOURS: u32 = 10 * 366 * 24;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Admin-site registration, fixed once at startup.
#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub site_title: String,
    /// Accounts allowed on the `/admin` routes.
    pub staff_usernames: HashSet<String>,
}

impl AdminConfig {
    pub fn is_staff(&self, username: &str) -> bool {
        self.staff_usernames.contains(username)
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub recency_window: RecencyWindow,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub admin: AdminConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", "5")?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Poll Settings ---
        let lookback_hours = recent_hours(&lookup, "RECENT_LOOKBACK_HOURS", "24")?;
        let lookahead_hours = recent_hours(&lookup, "RECENT_LOOKAHEAD_HOURS", "0")?;
        let recency_window = RecencyWindow::new(
            Duration::hours(i64::from(lookback_hours)),
            Duration::hours(i64::from(lookahead_hours)),
        );

        // --- Account Settings ---
        let session_ttl_days: u32 = parse_or(&lookup, "SESSION_TTL_DAYS", "30")?;
        if session_ttl_days == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let cookie_secure: bool = parse_or(&lookup, "COOKIE_SECURE", "false")?;
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Admin Registration ---
        let site_title = lookup("ADMIN_SITE_TITLE").unwrap_or_else(|| "Admin Panel".to_string());
        let staff_usernames: HashSet<String> = lookup("ADMIN_USERNAMES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            recency_window,
            session_ttl: Duration::days(i64::from(session_ttl_days)),
            cookie_secure,
            cors_origin,
            admin: AdminConfig {
                site_title,
                staff_usernames,
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn recent_hours<F>(lookup: &F, key: &str, default: &str) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let hours: u32 = parse_or(lookup, key, default)?;
    if hours > MAX_RECENT_HOURS {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at most {} hours", MAX_RECENT_HOURS),
        ));
    }
    Ok(hours)
}
