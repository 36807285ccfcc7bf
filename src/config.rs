use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Upper bound for how long a match result may be served from cache.
pub const MAX_MATCH_CACHE_TTL_SECS: u64 = 600;

/// Longest default offer validity accepted from the environment: one year.
pub const MAX_OFFER_VALIDITY_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub event_buffer_size: usize,
    pub trip_directory_timeout_ms: u64,
    pub match_cache_ttl_secs: u64,
    pub entity_cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub offer_validity_hours: i64,
    pub auto_accept_delay_ms: u64,
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_json: false,
            event_buffer_size: 1024,
            trip_directory_timeout_ms: 3000,
            match_cache_ttl_secs: MAX_MATCH_CACHE_TTL_SECS,
            entity_cache_ttl_secs: 30,
            cache_max_entries: 10_000,
            offer_validity_hours: 24,
            auto_accept_delay_ms: 2000,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            trip_directory_timeout_ms: parse_or_default(
                "TRIP_DIRECTORY_TIMEOUT_MS",
                defaults.trip_directory_timeout_ms,
            )?,
            match_cache_ttl_secs: parse_or_default(
                "MATCH_CACHE_TTL_SECS",
                defaults.match_cache_ttl_secs,
            )?
            .min(MAX_MATCH_CACHE_TTL_SECS),
            entity_cache_ttl_secs: parse_or_default(
                "ENTITY_CACHE_TTL_SECS",
                defaults.entity_cache_ttl_secs,
            )?,
            cache_max_entries: parse_or_default(
                "CACHE_MAX_ENTRIES",
                defaults.cache_max_entries,
            )?,
            offer_validity_hours: parse_or_default(
                "OFFER_VALIDITY_HOURS",
                defaults.offer_validity_hours,
            )?,
            auto_accept_delay_ms: parse_or_default(
                "AUTO_ACCEPT_DELAY_MS",
                defaults.auto_accept_delay_ms,
            )?,
            sweep_interval_secs: parse_or_default(
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that parse but cannot run the service sensibly.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=MAX_OFFER_VALIDITY_HOURS).contains(&self.offer_validity_hours) {
            return Err(AppError::Internal(format!(
                "invalid OFFER_VALIDITY_HOURS: {} is outside 1..={MAX_OFFER_VALIDITY_HOURS}",
                self.offer_validity_hours
            )));
        }
        if self.cache_max_entries == 0 {
            return Err(AppError::Internal(
                "invalid CACHE_MAX_ENTRIES: must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn trip_directory_timeout(&self) -> Duration {
        Duration::from_millis(self.trip_directory_timeout_ms)
    }

    pub fn match_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.match_cache_ttl_secs.min(MAX_MATCH_CACHE_TTL_SECS))
    }

    pub fn entity_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.entity_cache_ttl_secs)
    }

    pub fn auto_accept_delay(&self) -> Duration {
        Duration::from_millis(self.auto_accept_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
