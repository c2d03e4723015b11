mod alerts;
mod records;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use common::Result;

/// SQLite-backed home of the price history and the alert registry.
///
/// This is the only component that writes either table. Price records are
/// append-only. Alerts change only through conditional updates: the delivery
/// lease (`claim_alert` / `release_claim`) and the one-way `mark_triggered`.
#[derive(Clone)]
pub struct PriceStore {
    db: SqlitePool,
}

impl PriceStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn from_pool(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if missing) the database at `url` and apply migrations.
    /// `timeout` bounds both pool acquisition and SQLite's busy wait.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(timeout);

        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.migrate().await?;
        info!(url, "Price store ready");
        Ok(store)
    }

    /// Fresh private in-memory database, already migrated.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { db };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {ms}").into()))
}
