//! Postgres persistence: the [`UserStore`](crate::provider::UserStore)
//! implementation and the stub user backfill. Schema lives in `sql/schema.sql`.

pub mod populate;
pub mod postgres;

pub use populate::{DEFAULT_BATCH_SIZE, SourceTable, parse_tables, populate};
pub use postgres::PgUserStore;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

/// Open a small connection pool; the CLI runs one operation at a time.
///
/// # Errors
/// Returns an error if the database cannot be reached.
pub async fn connect(dsn: &SecretString) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")
}
