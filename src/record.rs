use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Name of the tidy long-format table in every backend.
pub const TABLE_NAME: &str = "mis_long";

/// Column order shared by the long CSV and all `mis_long` tables.
pub const COLUMNS: [&str; 11] = [
    "store_name",
    "parameter",
    "cafe_code",
    "region",
    "category",
    "for_ssg",
    "area_store",
    "store_start_date",
    "vintage",
    "month",
    "value",
];

/// One row of `mis_long`: a single metric for a single store in a single month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisRecord {
    pub store_name: String,
    pub parameter: String,
    pub cafe_code: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub for_ssg: Option<String>,
    pub area_store: Option<f64>,
    pub store_start_date: Option<NaiveDate>,
    pub vintage: Option<String>,
    /// Always the first day of the month.
    pub month: NaiveDate,
    pub value: Option<f64>,
}
