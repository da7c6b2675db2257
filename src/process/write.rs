use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Builder, Float64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use parquet::{
    arrow::ArrowWriter,
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use crate::record::{MisRecord, TABLE_NAME};

/// File name of the DuckDB loader emitted next to the long CSV.
pub const DUCKDB_SCRIPT_NAME: &str = "duckdb_load.sql";

/// Write the tidy table as UTF-8 CSV with a header row and every field quoted,
/// so store names containing commas survive.
pub fn write_long_csv<P: AsRef<Path>>(path: P, records: &[MisRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)
        .with_context(|| format!("creating file {}", path.display()))?;
    for r in records {
        wtr.serialize(r)
            .with_context(|| format!("writing record for {}", r.store_name))?;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    info!(rows = records.len(), path = %path.display(), "wrote long CSV");
    Ok(())
}

/// Read a long CSV with the `mis_long` header, as written by [`write_long_csv`].
pub fn read_long_csv<P: AsRef<Path>>(path: P) -> Result<Vec<MisRecord>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening long CSV {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, result) in rdr.deserialize::<MisRecord>().enumerate() {
        let rec = result.with_context(|| {
            format!("CSV parse error in {} at record {}", path.display(), idx)
        })?;
        out.push(rec);
    }
    debug!(rows = out.len(), "read long CSV");
    Ok(out)
}

/// DuckDB script that creates `mis_long`, loads `csv_path` into it and prints a
/// quick verification summary.
pub fn duckdb_load_script(csv_path: &Path) -> String {
    format!(
        r#"-- DuckDB table creation and data loading script
-- Generated for the store MIS long-format table

CREATE TABLE IF NOT EXISTS {table} (
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
);

COPY {table} FROM '{csv}' (HEADER, AUTO_DETECT TRUE);

SELECT
    COUNT(*) AS total_rows,
    COUNT(DISTINCT store_name) AS unique_stores,
    COUNT(DISTINCT parameter) AS unique_parameters,
    MIN(month) AS earliest_month,
    MAX(month) AS latest_month
FROM {table};

-- Revenue by region for 2024
-- SELECT region, SUM(value) AS total_revenue
-- FROM {table}
-- WHERE parameter = 'Revenue' AND month BETWEEN '2024-01-01' AND '2024-12-31'
-- GROUP BY region
-- ORDER BY total_revenue DESC;

-- Average margin by store (margin rows use the parameter '%')
-- SELECT store_name, AVG(value) AS avg_margin
-- FROM {table}
-- WHERE parameter = '%'
-- GROUP BY store_name
-- ORDER BY avg_margin DESC;

-- Monthly transaction trend
-- SELECT month, SUM(value) AS total_transactions
-- FROM {table}
-- WHERE parameter = 'Transactions'
-- GROUP BY month
-- ORDER BY month;
"#,
        table = TABLE_NAME,
        csv = csv_path.display().to_string().replace('\'', "''"),
    )
}

/// Write [`duckdb_load_script`] into `dir`, returning the script path.
pub fn write_duckdb_load_script(dir: &Path, csv_path: &Path) -> Result<PathBuf> {
    let script_path = dir.join(DUCKDB_SCRIPT_NAME);
    let csv_abs = fs::canonicalize(csv_path).unwrap_or_else(|_| csv_path.to_path_buf());
    fs::write(&script_path, duckdb_load_script(&csv_abs))
        .with_context(|| format!("writing {}", script_path.display()))?;
    Ok(script_path)
}

fn days_since_epoch(d: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (d - epoch).num_days() as i32
}

pub fn long_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("store_name", DataType::Utf8, false),
        Field::new("parameter", DataType::Utf8, false),
        Field::new("cafe_code", DataType::Utf8, true),
        Field::new("region", DataType::Utf8, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("for_ssg", DataType::Utf8, true),
        Field::new("area_store", DataType::Float64, true),
        Field::new("store_start_date", DataType::Date32, true),
        Field::new("vintage", DataType::Utf8, true),
        Field::new("month", DataType::Date32, false),
        Field::new("value", DataType::Float64, true),
    ])
}

fn to_record_batch(records: &[MisRecord]) -> Result<RecordBatch> {
    let n = records.len();
    let mut store_name = StringBuilder::with_capacity(n, n * 16);
    let mut parameter = StringBuilder::with_capacity(n, n * 8);
    let mut cafe_code = StringBuilder::new();
    let mut region = StringBuilder::new();
    let mut category = StringBuilder::new();
    let mut for_ssg = StringBuilder::new();
    let mut area_store = Float64Builder::with_capacity(n);
    let mut start_date = Date32Builder::with_capacity(n);
    let mut vintage = StringBuilder::new();
    let mut month = Date32Builder::with_capacity(n);
    let mut value = Float64Builder::with_capacity(n);

    for r in records {
        store_name.append_value(&r.store_name);
        parameter.append_value(&r.parameter);
        cafe_code.append_option(r.cafe_code.as_deref());
        region.append_option(r.region.as_deref());
        category.append_option(r.category.as_deref());
        for_ssg.append_option(r.for_ssg.as_deref());
        area_store.append_option(r.area_store);
        start_date.append_option(r.store_start_date.map(days_since_epoch));
        vintage.append_option(r.vintage.as_deref());
        month.append_value(days_since_epoch(r.month));
        value.append_option(r.value);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(store_name.finish()),
        Arc::new(parameter.finish()),
        Arc::new(cafe_code.finish()),
        Arc::new(region.finish()),
        Arc::new(category.finish()),
        Arc::new(for_ssg.finish()),
        Arc::new(area_store.finish()),
        Arc::new(start_date.finish()),
        Arc::new(vintage.finish()),
        Arc::new(month.finish()),
        Arc::new(value.finish()),
    ];
    RecordBatch::try_new(Arc::new(long_arrow_schema()), columns).map_err(Into::into)
}

/// Write the tidy table as a single Parquet file; returns the bytes written.
pub fn write_parquet(output_path: &Path, records: &[MisRecord]) -> Result<u64> {
    let batch = to_record_batch(records).context("building record batch")?;

    let file = File::create(output_path)
        .with_context(|| format!("creating file {}", output_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    let metadata = fs::metadata(output_path).context("getting file metadata")?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::file::reader::FileReader;
    use parquet::file::serialized_reader::SerializedFileReader;
    use tempfile::tempdir;

    fn sample() -> Vec<MisRecord> {
        vec![
            MisRecord {
                store_name: "Bandra, West".into(),
                parameter: "Revenue".into(),
                cafe_code: Some("C002".into()),
                region: Some("Mumbai".into()),
                category: None,
                for_ssg: None,
                area_store: Some(800.0),
                store_start_date: NaiveDate::from_ymd_opt(2021, 1, 15),
                vintage: Some("FY21".into()),
                month: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                value: Some(2500.5),
            },
            MisRecord {
                store_name: "Saket".into(),
                parameter: "%".into(),
                cafe_code: None,
                region: None,
                category: None,
                for_ssg: None,
                area_store: None,
                store_start_date: None,
                vintage: None,
                month: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                value: None,
            },
        ]
    }

    #[test]
    fn csv_quotes_every_field_and_reads_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clean_mis_long.csv");
        write_long_csv(&path, &sample())?;

        let text = fs::read_to_string(&path)?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "\"store_name\",\"parameter\",\"cafe_code\",\"region\",\"category\",\"for_ssg\",\
                 \"area_store\",\"store_start_date\",\"vintage\",\"month\",\"value\""
            )
        );
        let first = lines.next().unwrap_or_default();
        assert!(first.starts_with("\"Bandra, West\",\"Revenue\""));
        assert!(first.contains("\"2024-04-01\""));

        assert_eq!(read_long_csv(&path)?, sample());
        Ok(())
    }

    #[test]
    fn loader_script_points_at_csv() -> Result<()> {
        let dir = tempdir()?;
        let csv_path = dir.path().join("clean_mis_long.csv");
        write_long_csv(&csv_path, &sample())?;

        let script_path = write_duckdb_load_script(dir.path(), &csv_path)?;
        assert_eq!(script_path.file_name().unwrap(), DUCKDB_SCRIPT_NAME);
        let script = fs::read_to_string(script_path)?;
        assert!(script.contains("CREATE TABLE IF NOT EXISTS mis_long"));
        assert!(script.contains("clean_mis_long.csv' (HEADER, AUTO_DETECT TRUE);"));
        Ok(())
    }

    #[test]
    fn loader_script_escapes_quotes_in_path() {
        let script = duckdb_load_script(Path::new("/data/o'brien/long.csv"));
        assert!(script.contains("'/data/o''brien/long.csv'"));
    }

    #[test]
    fn parquet_export_keeps_row_count() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("mis_long.parquet");
        let bytes = write_parquet(&path, &sample())?;
        assert!(bytes > 0);

        let reader = SerializedFileReader::new(File::open(&path)?)?;
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);
        Ok(())
    }
}
