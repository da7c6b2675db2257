//! SQL backends holding the `mis_long` table.

pub mod duck;
pub mod postgres;
pub mod result;
pub mod supabase;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::record::MisRecord;

pub use duck::DuckStore;
pub use postgres::PgStore;
pub use result::{Cell, QueryResult};
pub use supabase::SupabaseStore;

/// Which database holds `mis_long`. Neon is plain Postgres with TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Duckdb,
    #[value(alias = "neon")]
    Postgres,
    Supabase,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Duckdb => "duckdb",
            Backend::Postgres => "postgres",
            Backend::Supabase => "supabase",
        }
    }

    /// Human-readable name for status output.
    pub fn label(&self) -> &'static str {
        match self {
            Backend::Duckdb => "DuckDB",
            Backend::Postgres => "PostgreSQL (Neon)",
            Backend::Supabase => "Supabase",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait MisStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Create `mis_long` (and its indexes) if missing.
    async fn ensure_schema(&self) -> Result<()>;

    /// Delete every row of `mis_long`.
    async fn clear(&self) -> Result<()>;

    /// Insert one batch; returns the number of rows written.
    async fn insert_batch(&self, records: &[MisRecord]) -> Result<u64>;

    async fn row_count(&self) -> Result<u64>;

    /// Run a read query and collect the full result.
    async fn query(&self, sql: &str) -> Result<QueryResult>;
}

/// Open the configured store for `backend`.
pub async fn connect(config: &Config, backend: Backend) -> Result<Arc<dyn MisStore>> {
    let store: Arc<dyn MisStore> = match backend {
        Backend::Duckdb => Arc::new(DuckStore::open(&config.duckdb_path)?),
        Backend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres backend")?;
            Arc::new(PgStore::connect(url).await?)
        }
        Backend::Supabase => {
            let url = config
                .supabase_url
                .as_deref()
                .context("SUPABASE_URL must be set for the supabase backend")?;
            let key = config
                .supabase_anon_key
                .as_deref()
                .context("SUPABASE_ANON_KEY must be set for the supabase backend")?;
            Arc::new(SupabaseStore::new(url, key)?)
        }
    };
    Ok(store)
}
