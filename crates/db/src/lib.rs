//! Database layer with `SeaORM` entities, migrations and the PostgreSQL ledger store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - [`SeaOrmLedgerStore`], the database implementation of the core `LedgerStore`
//! - [`DbExchangeRateResolver`] over the stored rate table
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod rates;
pub mod store;

pub use rates::DbExchangeRateResolver;
pub use store::{SeaOrmLedgerStore, SeaOrmTx};

use corebook_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    tracing::debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to database"
    );
    Database::connect(options).await
}
