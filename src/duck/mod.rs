use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate};
use duckdb::types::{TimeUnit, Value};
use duckdb::{Connection, ToSql};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::record::{MisRecord, TABLE_NAME};
use crate::store::{Cell, QueryResult};

pub const CREATE_MIS_LONG: &str = "CREATE TABLE IF NOT EXISTS mis_long (
    store_name TEXT,
    parameter TEXT,
    cafe_code TEXT,
    region TEXT,
    category TEXT,
    for_ssg TEXT,
    area_store DOUBLE,
    store_start_date DATE,
    vintage TEXT,
    month DATE,
    value DOUBLE
);";

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("opening duckdb file {}", path.as_ref().display()))?;
    Ok(conn)
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    Ok(conn)
}

/// Prepare the `mis_long` table in the given connection
pub fn create_mis_long(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_MIS_LONG)
        .context("creating mis_long")?;
    Ok(())
}

/// Insert rows via Appender::append_rows in bulk, using arrays of &dyn ToSql.
/// Returns elapsed seconds.
pub fn insert_records(conn: &Connection, records: &[MisRecord]) -> Result<f64> {
    let mut appender = conn.appender(TABLE_NAME)?;
    let start = Instant::now();

    appender.append_rows(records.iter().map(|r| {
        [
            &r.store_name as &dyn ToSql,
            &r.parameter as &dyn ToSql,
            &r.cafe_code as &dyn ToSql,
            &r.region as &dyn ToSql,
            &r.category as &dyn ToSql,
            &r.for_ssg as &dyn ToSql,
            &r.area_store as &dyn ToSql,
            &r.store_start_date as &dyn ToSql,
            &r.vintage as &dyn ToSql,
            &r.month as &dyn ToSql,
            &r.value as &dyn ToSql,
        ]
    }))?;
    appender.flush()?;
    let elapsed = start.elapsed().as_secs_f64();
    debug!(rows = records.len(), elapsed, "appended records");
    Ok(elapsed)
}

/// Bulk-load a long CSV with DuckDB's own reader.
pub fn load_csv(conn: &Connection, csv_path: &Path) -> Result<u64> {
    let sql = format!(
        "COPY {} FROM '{}' (HEADER, AUTO_DETECT TRUE);",
        TABLE_NAME,
        csv_path.display().to_string().replace('\'', "''")
    );
    let before = row_count(conn)?;
    conn.execute_batch(&sql)
        .with_context(|| format!("copying {} into {}", csv_path.display(), TABLE_NAME))?;
    let loaded = row_count(conn)? - before;
    info!(rows = loaded, path = %csv_path.display(), "loaded CSV into duckdb");
    Ok(loaded)
}

pub fn row_count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {};", TABLE_NAME), [], |r| {
        r.get(0)
    })?;
    Ok(n as u64)
}

pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute(&format!("DELETE FROM {};", TABLE_NAME), [])?;
    Ok(())
}

/// Run `sql` and collect every row as backend-neutral cells.
pub fn query(conn: &Connection, sql: &str) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql).context("preparing query")?;
    let mut rows = stmt.query([]).context("running query")?;
    let columns: Vec<String> = rows
        .as_ref()
        .map(|s| s.column_names())
        .unwrap_or_default();

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let v: Value = row.get(i)?;
            cells.push(cell_from_value(v));
        }
        out.push(cells);
    }
    Ok(QueryResult::new(columns, out))
}

fn cell_from_value(v: Value) -> Cell {
    match v {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Bool(b),
        Value::TinyInt(i) => Cell::Int(i.into()),
        Value::SmallInt(i) => Cell::Int(i.into()),
        Value::Int(i) => Cell::Int(i.into()),
        Value::BigInt(i) => Cell::Int(i),
        Value::HugeInt(i) => i64::try_from(i)
            .map(Cell::Int)
            .unwrap_or_else(|_| Cell::Text(i.to_string())),
        Value::UTinyInt(i) => Cell::Int(i.into()),
        Value::USmallInt(i) => Cell::Int(i.into()),
        Value::UInt(i) => Cell::Int(i.into()),
        Value::UBigInt(i) => i64::try_from(i)
            .map(Cell::Int)
            .unwrap_or_else(|_| Cell::Text(i.to_string())),
        Value::Float(f) => Cell::Float(f.into()),
        Value::Double(f) => Cell::Float(f),
        Value::Decimal(d) => {
            let s = d.to_string();
            s.parse().map(Cell::Float).unwrap_or(Cell::Text(s))
        }
        Value::Text(s) => Cell::Text(s),
        Value::Date32(days) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            Cell::Date(epoch + Duration::days(days.into()))
        }
        Value::Timestamp(unit, v) => {
            let micros = match unit {
                TimeUnit::Second => v.saturating_mul(1_000_000),
                TimeUnit::Millisecond => v.saturating_mul(1_000),
                TimeUnit::Microsecond => v,
                TimeUnit::Nanosecond => v / 1_000,
            };
            DateTime::from_timestamp_micros(micros)
                .map(|dt| Cell::Text(dt.naive_utc().to_string()))
                .unwrap_or(Cell::Null)
        }
        other => Cell::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::write_long_csv;
    use anyhow::Result;
    use tempfile::tempdir;

    fn record(store: &str, param: &str, month: u32, value: Option<f64>) -> MisRecord {
        MisRecord {
            store_name: store.into(),
            parameter: param.into(),
            cafe_code: Some("C001".into()),
            region: Some("Bangalore".into()),
            category: Some("CWK".into()),
            for_ssg: None,
            area_store: Some(1200.0),
            store_start_date: NaiveDate::from_ymd_opt(2019, 6, 15),
            vintage: Some("FY20".into()),
            month: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
            value,
        }
    }

    fn sample() -> Vec<MisRecord> {
        vec![
            record("Koramangala", "Revenue", 4, Some(1000.0)),
            record("Koramangala", "Revenue", 5, Some(-500.0)),
            record("Koramangala", "%", 4, Some(0.12)),
            record("Indiranagar", "Revenue", 4, None),
        ]
    }

    #[test]
    fn append_then_count() -> Result<()> {
        let conn = open_mem_db()?;
        create_mis_long(&conn)?;
        insert_records(&conn, &sample())?;
        assert_eq!(row_count(&conn)?, 4);

        clear(&conn)?;
        assert_eq!(row_count(&conn)?, 0);
        Ok(())
    }

    #[test]
    fn query_maps_types_to_cells() -> Result<()> {
        let conn = open_mem_db()?;
        create_mis_long(&conn)?;
        insert_records(&conn, &sample())?;

        let res = query(
            &conn,
            "SELECT store_name, month, value, COUNT(*) OVER () AS n \
             FROM mis_long WHERE parameter = 'Revenue' ORDER BY store_name, month",
        )?;
        assert_eq!(res.columns, vec!["store_name", "month", "value", "n"]);
        assert_eq!(res.rows.len(), 3);
        assert_eq!(res.rows[0][0], Cell::Text("Indiranagar".into()));
        assert_eq!(res.rows[0][2], Cell::Null);
        assert_eq!(
            res.rows[1][1],
            Cell::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
        );
        assert_eq!(res.rows[2][2], Cell::Float(-500.0));
        assert_eq!(res.rows[2][3], Cell::Int(3));
        Ok(())
    }

    #[test]
    fn copy_loads_quoted_long_csv() -> Result<()> {
        let dir = tempdir()?;
        let csv_path = dir.path().join("clean_mis_long.csv");
        write_long_csv(&csv_path, &sample())?;

        let conn = open_disk_db(dir.path().join("mis.duckdb"))?;
        create_mis_long(&conn)?;
        assert_eq!(load_csv(&conn, &csv_path)?, 4);

        let nulls: i64 = conn.query_row(
            "SELECT COUNT(*) FROM mis_long WHERE value IS NULL AND for_ssg IS NULL",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(nulls, 1);
        Ok(())
    }
}
