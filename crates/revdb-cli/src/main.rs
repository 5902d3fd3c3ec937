mod commands;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use revdb_core::PlanType;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "revdb-cli")]
#[command(about = "revdb maintenance command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one sync sweep over every source that is due
    Sweep {
        /// Treat this RFC 3339 instant as "now" instead of the system clock
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Register a user on a plan
    Register {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "free")]
        plan: PlanType,
    },
    /// Create the brand owned by a user
    CreateBrand {
        #[arg(long)]
        user: Uuid,

        #[arg(long)]
        name: String,
    },
    /// Show time-to-value, activation and retention for a user
    Metrics {
        #[arg(long)]
        user: Uuid,
    },
    /// List a user's activity ledger, newest first
    Activity {
        #[arg(long)]
        user: Uuid,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 20)]
        size: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("revdb-cli: no command given; see --help");
        return Ok(());
    };

    let config = revdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = revdb_db::PoolConfig::from_app_config(&config);
    let pool = revdb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Migrate => commands::run_migrate(&pool).await?,
        Commands::Sweep { at } => commands::run_sweep(&pool, &config, at).await?,
        Commands::Register { email, plan } => {
            commands::run_register(&pool, &email, plan).await?;
        }
        Commands::CreateBrand { user, name } => {
            commands::run_create_brand(&pool, user, &name).await?;
        }
        Commands::Metrics { user } => commands::run_metrics(&pool, &config, user).await?,
        Commands::Activity { user, page, size } => {
            commands::run_activity(&pool, user, page, size).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
