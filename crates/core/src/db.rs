//! Relational storage handle.
//!
//! All services share one [`Database`], a cheap-to-clone wrapper around a SQLite connection
//! pool. The schema lives in `migrations/` and is embedded into the binary at compile time.

use crate::config::CoreConfig;
use crate::HmsResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Shared handle to the relational store.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens a connection pool for the configured database URL.
    ///
    /// Foreign keys are enforced on every connection; the cascade rules in the schema depend
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::Database` if the URL is malformed or the database cannot be opened.
    pub async fn connect(cfg: &CoreConfig) -> HmsResult<Self> {
        let options = SqliteConnectOptions::from_str(cfg.database_url())?.foreign_keys(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(cfg.max_connections());
        if cfg.database_url().contains(":memory:") {
            // dropping the last connection would drop the database with it
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        tracing::debug!("opened database pool for {}", cfg.database_url());
        Ok(Self { pool })
    }

    /// Opens a fresh, migrated in-memory database.
    ///
    /// The pool is pinned to a single connection because every SQLite in-memory connection is
    /// its own database.
    pub async fn connect_in_memory() -> HmsResult<Self> {
        let db = Self::connect(&CoreConfig::in_memory()).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Applies any pending schema migrations.
    pub async fn migrate(&self) -> HmsResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
