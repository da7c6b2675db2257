//! Natural-language questions to SQL over `mis_long`.

pub mod prompt;
pub mod sql;

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{ChatProvider, ChatRequest, Message};
use crate::store::{Backend, Cell, MisStore, QueryResult};

pub use sql::{apply_row_limit, count_query, ensure_read_only, strip_code_fences, DEFAULT_ROW_LIMIT};

/// SQL flavour the model is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    DuckDb,
    Postgres,
}

impl Dialect {
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::DuckDb => "DuckDB",
            Dialect::Postgres => "PostgreSQL",
        }
    }
}

impl From<Backend> for Dialect {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Duckdb => Dialect::DuckDb,
            Backend::Postgres | Backend::Supabase => Dialect::Postgres,
        }
    }
}

pub struct NlToSql {
    provider: Arc<dyn ChatProvider>,
    dialect: Dialect,
}

impl NlToSql {
    pub fn new(provider: Arc<dyn ChatProvider>, dialect: Dialect) -> Self {
        Self { provider, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Ask the model for a single SQL statement answering `question`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn generate_sql(&self, question: &str) -> Result<String> {
        let req = ChatRequest::new(vec![
            Message::system(prompt::system_prompt(self.dialect)),
            Message::user(prompt::user_prompt(question)),
        ])
        .temperature(0.1)
        .max_tokens(1000);

        let resp = self
            .provider
            .chat(&req)
            .await
            .context("Error generating SQL query")?;
        let sql = strip_code_fences(&resp.content);
        anyhow::ensure!(!sql.is_empty(), "model returned an empty SQL query");
        debug!(tokens_in = resp.input_tokens, tokens_out = resp.output_tokens, "generated SQL");
        Ok(sql)
    }
}

/// A read query's result plus what the row limit hid.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Statement actually sent to the database.
    pub sql: String,
    #[serde(flatten)]
    pub result: QueryResult,
    /// Rows the unlimited query would return, when it could be counted.
    pub total_rows: Option<u64>,
    pub truncated: bool,
}

impl QueryOutcome {
    /// Terminal rendering: the table followed by count notes.
    pub fn render(&self) -> String {
        let mut out = self.result.render_table();
        if let Some(total) = self.total_rows {
            out.push_str(&format!("\n\nTotal matching rows: {total}"));
            if self.truncated {
                out.push_str(&format!(
                    "\nShowing first {} rows (limited for display)",
                    self.result.row_count()
                ));
            }
        }
        out
    }
}

fn count_from_result(result: &QueryResult) -> Option<u64> {
    match result.rows.first()?.first()? {
        Cell::Int(n) => u64::try_from(*n).ok(),
        Cell::Float(f) if *f >= 0.0 => Some(*f as u64),
        Cell::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Run a generated query: read-only check, row limit, then a best-effort
/// count of the unlimited result when the query had no limit of its own.
#[tracing::instrument(level = "info", skip(store))]
pub async fn execute(store: &dyn MisStore, sql: &str) -> Result<QueryOutcome> {
    ensure_read_only(sql)?;
    let limited_by_caller = sql::has_limit(sql);
    let limited = apply_row_limit(sql, DEFAULT_ROW_LIMIT);

    let result = store
        .query(&limited)
        .await
        .with_context(|| format!("Error executing query: {limited}"))?;
    info!(rows = result.row_count(), "query executed");

    let mut total_rows = None;
    if !limited_by_caller {
        match store.query(&count_query(sql)).await {
            Ok(counted) => total_rows = count_from_result(&counted),
            Err(e) => warn!("count query failed: {:#}", e),
        }
    }
    let truncated = total_rows.is_some_and(|t| t > result.row_count() as u64);

    Ok(QueryOutcome {
        sql: limited,
        result,
        total_rows,
        truncated,
    })
}
