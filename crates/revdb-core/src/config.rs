use crate::app_config::{AppConfig, Environment};
use crate::metrics::{
    MetricsPolicy, DEFAULT_ACTIVATION_WINDOW_DAYS, DEFAULT_RETENTION_MIN_LOGINS,
    DEFAULT_RETENTION_WINDOW_DAYS,
};
use crate::schedule::{
    RefreshCooldown, SyncWindow, DEFAULT_MANUAL_REFRESH_COOLDOWN_HOURS, DEFAULT_SYNC_HOUR,
};
use crate::ConfigError;

/// Sweep every 15 minutes; sources are picked up once their slot is due.
pub const DEFAULT_SYNC_SWEEP_CRON: &str = "0 */15 * * * *";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_as = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let value = parse_as(var, default)?;
        u32::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("REVDB_ENV", "development"))?;

    let bind_addr = or_default("REVDB_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "REVDB_BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;
    let log_level = or_default("REVDB_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("REVDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REVDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_as("REVDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let sync_timezone = or_default("REVDB_SYNC_TIMEZONE", "UTC")
        .trim()
        .parse::<chrono_tz::Tz>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "REVDB_SYNC_TIMEZONE".to_string(),
            reason: e.to_string(),
        })?;
    let sync_hour = parse_u32("REVDB_SYNC_HOUR", &DEFAULT_SYNC_HOUR.to_string())?;
    let sync_window =
        SyncWindow::new(sync_timezone, sync_hour).map_err(|e| ConfigError::InvalidEnvVar {
            var: "REVDB_SYNC_HOUR".to_string(),
            reason: e.to_string(),
        })?;
    let sync_sweep_cron = or_default("REVDB_SYNC_SWEEP_CRON", DEFAULT_SYNC_SWEEP_CRON);
    let sync_concurrency = parse_u32("REVDB_SYNC_CONCURRENCY", "4")?.max(1);

    let refresh_cooldown = RefreshCooldown::from_hours(parse_u32(
        "REVDB_MANUAL_REFRESH_COOLDOWN_HOURS",
        &DEFAULT_MANUAL_REFRESH_COOLDOWN_HOURS.to_string(),
    )?);

    let metrics_policy = MetricsPolicy::from_days(
        parse_u32(
            "REVDB_ACTIVATION_WINDOW_DAYS",
            &DEFAULT_ACTIVATION_WINDOW_DAYS.to_string(),
        )?,
        parse_u32(
            "REVDB_RETENTION_WINDOW_DAYS",
            &DEFAULT_RETENTION_WINDOW_DAYS.to_string(),
        )?,
        parse_u32(
            "REVDB_RETENTION_MIN_LOGINS",
            &DEFAULT_RETENTION_MIN_LOGINS.to_string(),
        )?,
    );

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        sync_window,
        sync_sweep_cron,
        sync_concurrency: usize::try_from(sync_concurrency).unwrap_or(1),
        refresh_cooldown,
        metrics_policy,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REVDB_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
