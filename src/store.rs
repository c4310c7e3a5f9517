//! Postgres store handle and the table registry.
//!
//! A [`Store`] is built once from [`DbSettings`] at startup, passed by
//! reference to every operation, and closed at shutdown.
//!
//! - [`materialize`]: creates a dataset table and its provisional registry row
//! - [`copy`]: bulk-loads a frame through `COPY ... FROM STDIN`
//! - [`registry`]: reads of registry entries

pub mod copy;
pub mod materialize;
pub mod registry;

pub use copy::bulk_load;
pub use materialize::materialize;
pub use registry::{EntryState, RegistryRow, TableMetadata};

use crate::config::DbSettings;
use crate::error::{Result, ResultExt as _};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Name of the registry table.
pub const REGISTRY_TABLE: &str = "meta_table";

const CREATE_REGISTRY_SQL: &str = r"
CREATE TABLE IF NOT EXISTS meta_table (
    id TEXT PRIMARY KEY,
    table_name TEXT NOT NULL UNIQUE,
    region TEXT,
    segment_subsegment TEXT,
    start_year INTEGER,
    end_year INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

/// Quotes an identifier for embedding in SQL text.
///
/// Names reaching this point come from the sanitizer, so quoting only guards
/// case and reserved words.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// `Storage` when the database cannot be reached within the timeout.
    pub async fn connect(settings: &DbSettings) -> Result<Self> {
        let options = settings.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL (timeout after {}s)",
                    settings.acquire_timeout_secs
                )
            })?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the registry table if it does not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_REGISTRY_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to create registry table")?;
        Ok(())
    }

    /// True when a table with this exact name exists in the current schema.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
