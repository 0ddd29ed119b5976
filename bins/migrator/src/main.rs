//! Database migration runner for the Corebook ledger schema.
//!
//! The database URL comes from `AppConfig` (`config/default.toml`, `config/{RUN_MODE}.toml`,
//! `COREBOOK__DATABASE__URL`); a `.env` file is honoured.
//!
//! Usage:
//!   migrator up      - Run all pending migrations (default)
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations

use anyhow::Context;
use corebook_db::migration::{Migrator, MigratorTrait};
use corebook_shared::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corebook=info,sea_orm_migration=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let config = AppConfig::load().context("failed to load configuration")?;
    let db = corebook_db::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    match command.as_str() {
        "up" => Migrator::up(&db, None).await?,
        "down" => Migrator::down(&db, Some(1)).await?,
        "status" => Migrator::status(&db).await?,
        "fresh" => Migrator::fresh(&db).await?,
        other => anyhow::bail!("unknown command '{other}', expected up, down, status or fresh"),
    }

    tracing::info!(command = %command, "migration command finished");
    Ok(())
}
