use anyhow::{Context, Result};
use async_trait::async_trait;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, SimpleQueryMessage};
use tracing::{debug, error, info};

use super::{Backend, Cell, MisStore, QueryResult};
use crate::record::{MisRecord, COLUMNS, TABLE_NAME};

pub const POSTGRES_DDL: &str = "
CREATE TABLE IF NOT EXISTS mis_long (
    id SERIAL PRIMARY KEY,
    store_name TEXT,
    parameter TEXT,
    cafe_code TEXT,
    region TEXT,
    category TEXT,
    for_ssg TEXT,
    area_store DOUBLE PRECISION,
    store_start_date DATE,
    vintage TEXT,
    month DATE,
    value DOUBLE PRECISION,
    created_at TIMESTAMP DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_mis_long_store_name ON mis_long(store_name);
CREATE INDEX IF NOT EXISTS idx_mis_long_parameter ON mis_long(parameter);
CREATE INDEX IF NOT EXISTS idx_mis_long_month ON mis_long(month);
CREATE INDEX IF NOT EXISTS idx_mis_long_region ON mis_long(region);
CREATE INDEX IF NOT EXISTS idx_mis_long_category ON mis_long(category);
";

/// Bind parameters one statement may carry on the Postgres wire protocol.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Rows per multi-row INSERT so a statement stays under [`MAX_BIND_PARAMS`].
pub const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / COLUMNS.len();

/// Split a batch into slices that each fit in one INSERT statement.
pub fn statement_chunks(records: &[MisRecord]) -> std::slice::Chunks<'_, MisRecord> {
    records.chunks(MAX_ROWS_PER_STATEMENT)
}

/// `mis_long` on Postgres (self-hosted, Neon, or Supabase's direct connection).
pub struct PgStore {
    client: Arc<Client>,
}

impl PgStore {
    /// Connect with `DATABASE_URL`. TLS is offered and used when the server
    /// supports it, which Neon requires.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let tls = TlsConnector::builder()
            .build()
            .context("building TLS connector")?;
        let (client, connection) = tokio_postgres::connect(database_url, MakeTlsConnector::new(tls))
            .await
            .context("connecting to postgres")?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {}", e);
            }
        });
        info!("connected to postgres");
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

/// `INSERT INTO mis_long (...) VALUES ($1, ..., $11), ($12, ...)` for `rows` rows.
pub fn insert_statement(rows: usize) -> String {
    let width = COLUMNS.len();
    let values: Vec<String> = (0..rows)
        .map(|r| {
            let placeholders: Vec<String> =
                (1..=width).map(|c| format!("${}", r * width + c)).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        TABLE_NAME,
        COLUMNS.join(", "),
        values.join(", ")
    )
}

fn record_params(r: &MisRecord) -> [&(dyn ToSql + Sync); 11] {
    [
        &r.store_name,
        &r.parameter,
        &r.cafe_code,
        &r.region,
        &r.category,
        &r.for_ssg,
        &r.area_store,
        &r.store_start_date,
        &r.vintage,
        &r.month,
        &r.value,
    ]
}

#[async_trait]
impl MisStore for PgStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client
            .batch_execute(POSTGRES_DDL)
            .await
            .context("creating mis_long")?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.client
            .execute(&format!("DELETE FROM {}", TABLE_NAME), &[])
            .await
            .context("clearing mis_long")?;
        Ok(())
    }

    async fn insert_batch(&self, records: &[MisRecord]) -> Result<u64> {
        let mut inserted = 0;
        for chunk in statement_chunks(records) {
            let sql = insert_statement(chunk.len());
            let params: Vec<&(dyn ToSql + Sync)> = chunk.iter().flat_map(record_params).collect();
            inserted += self
                .client
                .execute(&sql, &params)
                .await
                .context("inserting batch")?;
        }
        debug!(rows = inserted, "inserted batch");
        Ok(inserted)
    }

    async fn row_count(&self) -> Result<u64> {
        let row = self
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {}", TABLE_NAME), &[])
            .await
            .context("counting mis_long")?;
        let n: i64 = row.get(0);
        Ok(n as u64)
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .context("running query")?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        for msg in messages {
            match msg {
                SimpleQueryMessage::RowDescription(cols) => {
                    columns = cols.iter().map(|c| c.name().to_string()).collect();
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let cells = (0..row.len())
                        .map(|i| match row.get(i) {
                            Some(v) => Cell::Text(v.to_string()),
                            None => Cell::Null,
                        })
                        .collect();
                    rows.push(cells);
                }
                _ => {}
            }
        }
        Ok(QueryResult::new(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn insert_statement_numbers_placeholders_per_row() {
        let sql = insert_statement(2);
        assert!(sql.starts_with(
            "INSERT INTO mis_long (store_name, parameter, cafe_code, region, category, for_ssg, \
             area_store, store_start_date, vintage, month, value) VALUES ("
        ));
        assert!(sql.contains("($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"));
        assert!(sql.ends_with("($12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)"));
    }

    #[test]
    fn large_batches_split_under_the_bind_limit() {
        let month = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let batch: Vec<MisRecord> = (0..12_000)
            .map(|i| MisRecord {
                store_name: format!("Store {i}"),
                parameter: "Revenue".into(),
                cafe_code: None,
                region: None,
                category: None,
                for_ssg: None,
                area_store: None,
                store_start_date: None,
                vintage: None,
                month,
                value: None,
            })
            .collect();

        let sizes: Vec<usize> = statement_chunks(&batch).map(<[MisRecord]>::len).collect();
        assert_eq!(MAX_ROWS_PER_STATEMENT, 5957);
        assert_eq!(sizes, vec![5957, 5957, 86]);
        for size in sizes {
            assert!(size * COLUMNS.len() <= MAX_BIND_PARAMS);
        }
        let last = format!("${})", MAX_ROWS_PER_STATEMENT * COLUMNS.len());
        assert!(insert_statement(MAX_ROWS_PER_STATEMENT).ends_with(&last));
        assert_eq!(statement_chunks(&batch[..10]).count(), 1);
    }

    #[test]
    fn params_follow_column_order() {
        let r = MisRecord {
            store_name: "Saket".into(),
            parameter: "Revenue".into(),
            cafe_code: None,
            region: None,
            category: None,
            for_ssg: None,
            area_store: None,
            store_start_date: None,
            vintage: None,
            month: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value: Some(1.0),
        };
        assert_eq!(record_params(&r).len(), COLUMNS.len());
    }

    #[test]
    fn ddl_has_indexes_on_filter_columns() {
        for col in ["store_name", "parameter", "month", "region", "category"] {
            assert!(POSTGRES_DDL.contains(&format!("idx_mis_long_{col} ON mis_long({col})")));
        }
    }
}
