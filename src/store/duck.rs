use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{Backend, MisStore, QueryResult};
use crate::duck;
use crate::record::MisRecord;

/// `mis_long` in a DuckDB file or in memory. DuckDB calls block, so every
/// operation runs on the blocking pool.
#[derive(Clone)]
pub struct DuckStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckStore {
    pub fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening duckdb");
        Ok(Self::from_connection(duck::open_disk_db(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(duck::open_mem_db()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Load a long CSV straight through DuckDB's `COPY`.
    pub async fn load_csv(&self, csv_path: &Path) -> Result<u64> {
        let path = csv_path.to_path_buf();
        self.with_conn(move |c| duck::load_csv(c, &path)).await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("duckdb connection mutex poisoned"))?;
            f(&guard)
        })
        .await
        .context("duckdb task panicked")?
    }
}

#[async_trait]
impl MisStore for DuckStore {
    fn backend(&self) -> Backend {
        Backend::Duckdb
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.with_conn(duck::create_mis_long).await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(duck::clear).await
    }

    async fn insert_batch(&self, records: &[MisRecord]) -> Result<u64> {
        let records = records.to_vec();
        let n = records.len() as u64;
        self.with_conn(move |c| duck::insert_records(c, &records))
            .await?;
        Ok(n)
    }

    async fn row_count(&self) -> Result<u64> {
        self.with_conn(duck::row_count).await
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        self.with_conn(move |c| duck::query(c, &sql)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cell;
    use chrono::NaiveDate;

    fn rec(store: &str, value: f64) -> MisRecord {
        MisRecord {
            store_name: store.into(),
            parameter: "Revenue".into(),
            cafe_code: None,
            region: Some("Delhi".into()),
            category: None,
            for_ssg: None,
            area_store: None,
            store_start_date: None,
            vintage: None,
            month: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value: Some(value),
        }
    }

    #[tokio::test]
    async fn store_round_trip() -> Result<()> {
        let store = DuckStore::in_memory()?;
        store.ensure_schema().await?;
        store.ensure_schema().await?;
        assert_eq!(store.insert_batch(&[rec("Saket", 10.0), rec("Hauz Khas", 5.0)]).await?, 2);
        assert_eq!(store.row_count().await?, 2);

        let res = store
            .query("SELECT SUM(value) AS total FROM mis_long WHERE region = 'Delhi'")
            .await?;
        assert_eq!(res.columns, vec!["total"]);
        assert_eq!(res.rows, vec![vec![Cell::Float(15.0)]]);

        store.clear().await?;
        assert_eq!(store.row_count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn load_csv_appends_through_copy() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let csv_path = dir.path().join("clean_mis_long.csv");
        crate::process::write_long_csv(&csv_path, &[rec("Saket", 1.0), rec("Saket", 2.0)])?;

        let store = DuckStore::in_memory()?;
        store.ensure_schema().await?;
        assert_eq!(store.load_csv(&csv_path).await?, 2);
        assert_eq!(store.load_csv(&csv_path).await?, 2);
        assert_eq!(store.row_count().await?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn bad_sql_is_an_error() -> Result<()> {
        let store = DuckStore::in_memory()?;
        store.ensure_schema().await?;
        assert!(store.query("SELECT nope FROM mis_long").await.is_err());
        Ok(())
    }
}
