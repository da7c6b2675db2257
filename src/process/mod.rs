// src/process/mod.rs
pub mod date_parser;
pub mod header;
pub mod melt;
pub mod raw_table;
pub mod utils;
pub mod write;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::debug;

pub use header::{find_header_row, normalize_column_name, MetadataColumn};
pub use melt::{melt, MeltSummary, MeltedTable};
pub use raw_table::RawTable;
pub use write::{read_long_csv, write_duckdb_load_script, write_long_csv, write_parquet};

/// Open the cross-tab CSV at `path` and split it into header and data rows.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_cross_tab<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;
    read_cross_tab(file)
        .with_context(|| format!("Failed to read cross-tab CSV: {:?}", path.as_ref()))
}

/// Read a cross-tab CSV without trusting its first line to be the header.
///
/// - Records may have differing field counts; short rows are padded.
/// - Blank header cells become `Unnamed_<i>`.
/// - Columns that are empty in every data row are dropped.
pub fn read_cross_tab<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut all_rows: Vec<Vec<String>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        all_rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    if all_rows.is_empty() {
        bail!("CSV file is empty");
    }

    let header_row = find_header_row(&all_rows);
    let width = all_rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut headers: Vec<String> = all_rows[header_row]
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            if h.is_empty() {
                format!("Unnamed_{}", i)
            } else {
                h.to_string()
            }
        })
        .collect();
    for i in headers.len()..width {
        headers.push(format!("Unnamed_{}", i));
    }

    let mut rows: Vec<Vec<String>> = all_rows
        .into_iter()
        .skip(header_row + 1)
        .map(|mut r| {
            r.resize(width, String::new());
            r
        })
        .collect();

    // drop columns with no data at all
    let keep: Vec<bool> = (0..width)
        .map(|c| rows.iter().any(|r| !r[c].trim().is_empty()))
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        debug!(dropped, "dropping empty columns");
        headers = retain_columns(headers, &keep);
        rows = rows.into_iter().map(|r| retain_columns(r, &keep)).collect();
    }

    Ok(RawTable {
        headers,
        rows,
        header_row,
    })
}

fn retain_columns(values: Vec<String>, keep: &[bool]) -> Vec<String> {
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(v, k)| k.then_some(v))
        .collect()
}
