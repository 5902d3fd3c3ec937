//! Command handlers for the CLI.
//!
//! Called from `main` once the config is loaded and the pool is connected.

use chrono::{DateTime, Utc};
use revdb_core::{AppConfig, Clock, FixedClock, PlanType, SystemClock};
use revdb_sync::NoopFetcher;
use uuid::Uuid;

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub(crate) async fn run_migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let applied = revdb_db::run_migrations(pool).await?;
    println!("migrations up to date ({applied} applied)");
    Ok(())
}

/// Run one sync sweep. `at` pins the clock, which lets an operator replay a
/// missed slot or test a schedule without waiting for it.
///
/// # Errors
///
/// Returns an error if the due sources cannot be listed. Per-source sync
/// failures are recorded on the sources and only counted here.
pub(crate) async fn run_sweep(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let clock: Box<dyn Clock> = match at {
        Some(instant) => Box::new(FixedClock(instant)),
        None => Box::new(SystemClock),
    };

    let report = revdb_sync::run_sync_sweep(
        pool,
        &NoopFetcher,
        &config.sync_window,
        clock.as_ref(),
        config.sync_concurrency,
    )
    .await?;

    println!(
        "sweep at {}: {} due, {} succeeded, {} failed, {} unrecorded, {} new reviews",
        clock.now().format("%Y-%m-%d %H:%M:%S UTC"),
        report.sources,
        report.succeeded,
        report.failed,
        report.errored,
        report.reviews_inserted
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the email is blank or taken.
pub(crate) async fn run_register(
    pool: &sqlx::PgPool,
    email: &str,
    plan: PlanType,
) -> anyhow::Result<()> {
    let user = revdb_db::create_user(pool, email, plan, Utc::now()).await?;
    println!(
        "registered {} on the {} plan ({} sources allowed): {}",
        user.email, user.plan_type, user.max_sources_allowed, user.id
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the user is unknown or already owns a brand.
pub(crate) async fn run_create_brand(
    pool: &sqlx::PgPool,
    user: Uuid,
    name: &str,
) -> anyhow::Result<()> {
    let brand = revdb_db::create_brand(pool, user, name).await?;
    println!("created brand '{}' (id {})", brand.name, brand.id);
    Ok(())
}

/// Print the success funnel for one user.
///
/// # Errors
///
/// Returns an error if the user does not exist or the query fails.
pub(crate) async fn run_metrics(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    user: Uuid,
) -> anyhow::Result<()> {
    if revdb_db::get_user(pool, user).await?.is_none() {
        anyhow::bail!("user {user} not found");
    }
    let timeline = revdb_db::load_user_timeline(pool, user).await?;

    let metrics = timeline.summarize(&config.metrics_policy);
    let fmt_time = |t: Option<DateTime<Utc>>| {
        t.map_or_else(
            || "-".to_string(),
            |t| t.format("%Y-%m-%d %H:%M").to_string(),
        )
    };

    println!("{:<28}{}", "registered", fmt_time(metrics.registered_at));
    println!(
        "{:<28}{}",
        "first source configured",
        fmt_time(metrics.first_source_configured_at)
    );
    println!(
        "{:<28}{}",
        "time to value",
        metrics
            .time_to_value_seconds
            .map_or_else(|| "-".to_string(), format_duration)
    );
    println!("{:<28}{}", "activated", metrics.activated);
    println!(
        "{:<28}{}",
        "logins in retention window", metrics.logins_in_retention_window
    );
    println!("{:<28}{}", "retained", metrics.retained);
    Ok(())
}

/// Print one page of a user's ledger.
///
/// # Errors
///
/// Returns an error if `page`/`size` are out of range or the query fails.
pub(crate) async fn run_activity(
    pool: &sqlx::PgPool,
    user: Uuid,
    page: i64,
    size: i64,
) -> anyhow::Result<()> {
    let activity = revdb_db::list_activity(pool, user, page, size).await?;

    if activity.entries.is_empty() {
        println!("no activity on page {page} ({} entries total)", activity.total);
        return Ok(());
    }

    println!("{:<18}{:<40}{:<10}METADATA", "OCCURRED", "TYPE", "BRAND");
    for entry in &activity.entries {
        println!(
            "{:<18}{:<40}{:<10}{}",
            entry.occurred_at.format("%Y-%m-%d %H:%M"),
            entry.activity_type,
            entry
                .brand_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            entry.metadata
        );
    }
    println!(
        "page {} of {} ({} entries)",
        activity.page,
        page_count(activity.total, activity.size),
        activity.total
    );
    Ok(())
}

/// `3725` -> `1h 2m 5s`; negative values keep their sign.
pub(crate) fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let s = seconds.unsigned_abs();
    let (h, m, s) = (s / 3600, (s % 3600) / 60, s % 60);
    if h > 0 {
        format!("{sign}{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{sign}{m}m {s}s")
    } else {
        format!("{sign}{s}s")
    }
}

pub(crate) fn page_count(total: i64, size: i64) -> i64 {
    if size <= 0 {
        return 0;
    }
    (total + size - 1) / size
}
