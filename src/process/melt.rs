use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::process::{
    date_parser::{parse_date_value, parse_month_column},
    header::{normalize_column_name, MetadataColumn},
    raw_table::RawTable,
    utils::{clean_string_value, is_percent_parameter, parse_numeric_value},
};
use crate::record::MisRecord;

/// Output of [`melt`]: the tidy rows plus what was detected along the way.
#[derive(Debug, Clone)]
pub struct MeltedTable {
    pub records: Vec<MisRecord>,
    /// `(header label, first-of-month)` for every month column, in sheet order.
    pub month_columns: Vec<(String, NaiveDate)>,
}

/// Headline numbers for the verbose report.
#[derive(Debug, Clone, PartialEq)]
pub struct MeltSummary {
    pub rows: usize,
    pub unique_stores: usize,
    pub parameters: Vec<String>,
    pub first_month: Option<NaiveDate>,
    pub last_month: Option<NaiveDate>,
}

impl MeltedTable {
    pub fn summary(&self) -> MeltSummary {
        let stores: BTreeSet<&str> = self.records.iter().map(|r| r.store_name.as_str()).collect();
        let mut parameters: Vec<String> = Vec::new();
        for r in &self.records {
            if !parameters.contains(&r.parameter) {
                parameters.push(r.parameter.clone());
            }
        }
        MeltSummary {
            rows: self.records.len(),
            unique_stores: stores.len(),
            parameters,
            first_month: self.records.iter().map(|r| r.month).min(),
            last_month: self.records.iter().map(|r| r.month).max(),
        }
    }

    /// Month range implied by the header row.
    pub fn header_month_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.month_columns.iter().map(|(_, m)| *m).min()?;
        let last = self.month_columns.iter().map(|(_, m)| *m).max()?;
        Some((first, last))
    }
}

/// Per-row metadata shared by every month cell of that row.
struct RowMeta {
    store_name: Option<String>,
    parameter: Option<String>,
    cafe_code: Option<String>,
    region: Option<String>,
    category: Option<String>,
    for_ssg: Option<String>,
    area_store: Option<f64>,
    store_start_date: Option<NaiveDate>,
    vintage: Option<String>,
}

impl RowMeta {
    fn from_row(row: &[String], index: &HashMap<MetadataColumn, usize>) -> Self {
        let cell = |c: MetadataColumn| index.get(&c).map(|&i| row[i].as_str());
        let text = |c: MetadataColumn| cell(c).and_then(clean_string_value);
        RowMeta {
            store_name: text(MetadataColumn::StoreName),
            parameter: text(MetadataColumn::Parameter),
            cafe_code: text(MetadataColumn::CafeCode),
            region: text(MetadataColumn::Region),
            category: text(MetadataColumn::Category),
            for_ssg: text(MetadataColumn::ForSsg),
            area_store: cell(MetadataColumn::AreaStore).and_then(|s| parse_numeric_value(s, false)),
            store_start_date: cell(MetadataColumn::StoreStartDate).and_then(parse_date_value),
            vintage: text(MetadataColumn::Vintage),
        }
    }
}

/// Reshape the wide sheet into one record per (store, parameter, month).
///
/// Rows without a store name or parameter are dropped, as are columns whose
/// header is not a recognisable month. Output is sorted by
/// `(store_name, parameter, month)`.
#[tracing::instrument(level = "info", skip(table), fields(rows = table.rows.len()))]
pub fn melt(table: &RawTable) -> Result<MeltedTable> {
    let normalized: Vec<String> = table
        .headers
        .iter()
        .map(|h| normalize_column_name(h))
        .collect();

    let mut index: HashMap<MetadataColumn, usize> = HashMap::new();
    let mut month_idx: Vec<(usize, String, NaiveDate)> = Vec::new();
    for (i, name) in normalized.iter().enumerate() {
        if let Some(col) = MetadataColumn::from_column_name(name) {
            index.entry(col).or_insert(i);
        } else if let Some(month) = parse_month_column(name) {
            month_idx.push((i, name.clone(), month));
        } else {
            debug!(column = %name, "ignoring non-month column");
        }
    }

    for required in [MetadataColumn::StoreName, MetadataColumn::Parameter] {
        if !index.contains_key(&required) {
            bail!(
                "required column '{}' not found in header row {}",
                required.source_label(),
                table.header_row
            );
        }
    }
    if month_idx.is_empty() {
        bail!("no month columns detected in header row {}", table.header_row);
    }
    info!(months = month_idx.len(), "detected month columns");

    let mut records = Vec::with_capacity(table.rows.len() * month_idx.len());
    let mut skipped_rows = 0usize;
    for row in &table.rows {
        let meta = RowMeta::from_row(row, &index);
        let (Some(store_name), Some(parameter)) = (&meta.store_name, &meta.parameter) else {
            skipped_rows += 1;
            continue;
        };
        let pct = is_percent_parameter(Some(parameter.as_str()));

        for (col, _, month) in &month_idx {
            records.push(MisRecord {
                store_name: store_name.clone(),
                parameter: parameter.clone(),
                cafe_code: meta.cafe_code.clone(),
                region: meta.region.clone(),
                category: meta.category.clone(),
                for_ssg: meta.for_ssg.clone(),
                area_store: meta.area_store,
                store_start_date: meta.store_start_date,
                vintage: meta.vintage.clone(),
                month: *month,
                value: parse_numeric_value(&row[*col], pct),
            });
        }
    }
    if skipped_rows > 0 {
        debug!(skipped_rows, "rows without store name or parameter");
    }

    records.sort_by(|a, b| {
        (&a.store_name, &a.parameter, a.month).cmp(&(&b.store_name, &b.parameter, b.month))
    });

    Ok(MeltedTable {
        records,
        month_columns: month_idx
            .into_iter()
            .map(|(_, label, month)| (label, month))
            .collect(),
    })
}
