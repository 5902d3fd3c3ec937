//! Offline tests for revdb-db pool configuration, row types and errors.
//! These tests do not require a live database connection.

use chrono::{TimeDelta, Utc};
use revdb_core::{
    AppConfig, Environment, MetricsPolicy, PlanType, PlatformType, QuotaExceeded,
    RefreshCooldown, SourceKey, SyncStatus, SyncWindow,
};
use revdb_db::{DbError, PoolConfig, ReviewRow, ReviewSourceRow};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        sync_window: SyncWindow::default(),
        sync_sweep_cron: "0 */15 * * * *".to_string(),
        sync_concurrency: 4,
        refresh_cooldown: RefreshCooldown::default(),
        metrics_policy: MetricsPolicy::default(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn source_row() -> ReviewSourceRow {
    let now = Utc::now();
    ReviewSourceRow {
        id: 1,
        brand_id: 7,
        platform_type: "trustpilot".to_string(),
        external_profile_id: " acme.com ".to_string(),
        profile_url: "https://trustpilot.example/acme.com".to_string(),
        auth_method: "scraping".to_string(),
        is_active: true,
        last_sync_at: None,
        last_sync_status: Some("failed".to_string()),
        last_sync_error: Some("timeout".to_string()),
        next_scheduled_sync_at: now,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn review_source_row_parses_stored_enums() {
    let row = source_row();
    assert_eq!(row.platform().unwrap(), PlatformType::Trustpilot);
    assert_eq!(row.sync_status().unwrap(), Some(SyncStatus::Failed));
    assert_eq!(
        row.key().unwrap(),
        SourceKey::new(7, PlatformType::Trustpilot, "acme.com")
    );
}

#[test]
fn review_source_row_rejects_unknown_platform() {
    let row = ReviewSourceRow {
        platform_type: "yelp".to_string(),
        ..source_row()
    };
    assert!(row.platform().is_err());
}

#[test]
fn review_row_without_sentiment_has_none() {
    let now = Utc::now();
    let row = ReviewRow {
        id: 3,
        review_source_id: 1,
        brand_id: 7,
        external_review_id: None,
        author_name: None,
        rating: None,
        content: "fine".to_string(),
        content_hash: "abc".to_string(),
        sentiment: None,
        published_at: None,
        created_at: now,
        updated_at: now,
    };
    assert_eq!(row.current_sentiment().unwrap(), None);
}

#[test]
fn quota_error_message_names_plan_and_counts() {
    let err = DbError::QuotaExceeded(QuotaExceeded {
        current_count: 3,
        max_allowed: 3,
        plan_type: PlanType::Starter,
    });
    assert_eq!(
        err.to_string(),
        "source limit reached: 3 of 3 sources on the starter plan"
    );
}

#[test]
fn duplicate_error_message_names_key() {
    let err = DbError::DuplicateSource {
        key: SourceKey::new(7, PlatformType::Google, "abc"),
    };
    assert_eq!(
        err.to_string(),
        "review source already exists: brand 7 / google / abc"
    );
}

#[test]
fn cooldown_is_not_retryable() {
    let err = DbError::CooldownActive {
        remaining: TimeDelta::hours(1),
    };
    assert!(!err.is_retryable());
}
