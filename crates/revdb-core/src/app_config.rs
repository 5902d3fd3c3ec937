use std::net::SocketAddr;

use crate::metrics::MetricsPolicy;
use crate::schedule::{RefreshCooldown, SyncWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub sync_window: SyncWindow,
    pub sync_sweep_cron: String,
    pub sync_concurrency: usize,
    pub refresh_cooldown: RefreshCooldown,
    pub metrics_policy: MetricsPolicy,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("sync_timezone", &self.sync_window.timezone().name())
            .field("sync_hour", &self.sync_window.hour())
            .field("sync_sweep_cron", &self.sync_sweep_cron)
            .field("sync_concurrency", &self.sync_concurrency)
            .field(
                "manual_refresh_cooldown_hours",
                &self.refresh_cooldown.window().num_hours(),
            )
            .field("metrics_policy", &self.metrics_policy)
            .finish()
    }
}
