use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::postgres::POSTGRES_DDL;
use super::{Backend, Cell, MisStore, QueryResult};
use crate::record::{MisRecord, TABLE_NAME};

/// `mis_long` behind Supabase's PostgREST API.
///
/// Raw SQL needs an `exec_sql(sql text)` function returning `json` to be
/// installed in the project; everything else uses the plain table endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
}

impl SupabaseStore {
    pub fn new(project_url: &str, anon_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(anon_key).context("invalid SUPABASE_ANON_KEY")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {anon_key}"))
                .context("invalid SUPABASE_ANON_KEY")?,
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.rest_url, TABLE_NAME)
    }

    async fn check(resp: Response, what: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        bail!("supabase {what} failed ({status}): {body}")
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Rows returned by `exec_sql`: an array of objects, keyed in select order.
pub fn json_rows_to_result(value: &Value) -> QueryResult {
    let rows: &[Value] = match value {
        Value::Array(rows) => rows.as_slice(),
        Value::Null => &[],
        other => std::slice::from_ref(other),
    };
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(Cell::from_json).unwrap_or(Cell::Null))
                .collect()
        })
        .collect();
    QueryResult::new(columns, cells)
}

#[async_trait]
impl MisStore for SupabaseStore {
    fn backend(&self) -> Backend {
        Backend::Supabase
    }

    /// PostgREST cannot run DDL, so this only checks the table is reachable.
    async fn ensure_schema(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.table_url())
            .query(&[("select", "store_name"), ("limit", "1")])
            .send()
            .await
            .context("reaching supabase")?;
        if !resp.status().is_success() {
            let status = resp.status();
            bail!(
                "mis_long is not available on supabase ({status}); create it in the SQL editor with:\n{POSTGRES_DDL}"
            );
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        // PostgREST refuses unfiltered deletes
        let resp = self
            .client
            .delete(self.table_url())
            .query(&[("store_name", "not.is.null")])
            .send()
            .await
            .context("clearing mis_long")?;
        Self::check(resp, "delete").await?;
        info!("cleared supabase mis_long");
        Ok(())
    }

    async fn insert_batch(&self, records: &[MisRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let resp = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await
            .context("inserting batch")?;
        Self::check(resp, "insert").await?;
        debug!(rows = records.len(), "inserted batch");
        Ok(records.len() as u64)
    }

    async fn row_count(&self) -> Result<u64> {
        let resp = self
            .client
            .get(self.table_url())
            .query(&[("select", "store_name"), ("limit", "1")])
            .header("Prefer", "count=exact")
            .send()
            .await
            .context("counting mis_long")?;
        let resp = Self::check(resp, "count").await?;
        let range = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .context("supabase count response has no Content-Range header")?;
        parse_content_range_total(range)
            .with_context(|| format!("unexpected Content-Range: {range}"))
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let resp = self
            .client
            .post(format!("{}/rpc/exec_sql", self.rest_url))
            .json(&json!({ "sql": sql }))
            .send()
            .await
            .context("calling exec_sql")?;
        let resp = Self::check(resp, "exec_sql").await?;
        let body: Value = resp.json().await.context("decoding exec_sql response")?;
        Ok(json_rows_to_result(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range_total("0-0/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn exec_sql_rows_keep_column_order() {
        let body = json!([
            {"region": "Mumbai", "total": 2500.5},
            {"region": "Delhi", "total": 7},
        ]);
        let res = json_rows_to_result(&body);
        assert_eq!(res.columns, vec!["region", "total"]);
        assert_eq!(res.rows[1], vec![Cell::Text("Delhi".into()), Cell::Int(7)]);
        assert!(json_rows_to_result(&Value::Null).is_empty());
    }
}
