use tracing::debug;

/// Only the top of the sheet is searched for the header row.
pub const HEADER_SCAN_ROWS: usize = 10;

/// A row is taken as the header once this many expected labels appear in it.
pub const MIN_HEADER_MATCHES: usize = 5;

/// The per-store descriptive columns that precede the month columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataColumn {
    StoreName,
    Parameter,
    CafeCode,
    Region,
    Category,
    ForSsg,
    AreaStore,
    StoreStartDate,
    Vintage,
}

impl MetadataColumn {
    pub const ALL: [MetadataColumn; 9] = [
        MetadataColumn::StoreName,
        MetadataColumn::Parameter,
        MetadataColumn::CafeCode,
        MetadataColumn::Region,
        MetadataColumn::Category,
        MetadataColumn::ForSsg,
        MetadataColumn::AreaStore,
        MetadataColumn::StoreStartDate,
        MetadataColumn::Vintage,
    ];

    /// Label as it appears in the source sheet.
    pub fn source_label(&self) -> &'static str {
        match self {
            MetadataColumn::StoreName => "Store Name",
            MetadataColumn::Parameter => "Parameter",
            MetadataColumn::CafeCode => "Cafe Codes",
            MetadataColumn::Region => "Region",
            MetadataColumn::Category => "Category",
            MetadataColumn::ForSsg => "FOR SSG",
            MetadataColumn::AreaStore => "Area",
            MetadataColumn::StoreStartDate => "Store Start Date",
            MetadataColumn::Vintage => "Vintage",
        }
    }

    /// snake_case column name used in `mis_long`.
    pub fn column_name(&self) -> &'static str {
        match self {
            MetadataColumn::StoreName => "store_name",
            MetadataColumn::Parameter => "parameter",
            MetadataColumn::CafeCode => "cafe_code",
            MetadataColumn::Region => "region",
            MetadataColumn::Category => "category",
            MetadataColumn::ForSsg => "for_ssg",
            MetadataColumn::AreaStore => "area_store",
            MetadataColumn::StoreStartDate => "store_start_date",
            MetadataColumn::Vintage => "vintage",
        }
    }

    pub fn from_source_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.source_label() == label)
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.column_name() == name)
    }
}

/// Find the index of the real header row.
///
/// Sheets exported from the MIS workbook carry title and blank rows above the
/// header, so the first [`HEADER_SCAN_ROWS`] rows are checked for at least
/// [`MIN_HEADER_MATCHES`] expected labels. Falls back to row 0.
pub fn find_header_row(rows: &[Vec<String>]) -> usize {
    for (idx, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let matches = MetadataColumn::ALL
            .iter()
            .filter(|c| row.iter().any(|cell| cell.trim() == c.source_label()))
            .count();
        if matches >= MIN_HEADER_MATCHES {
            debug!(row = idx, matches, "header row found");
            return idx;
        }
    }
    debug!("no header row matched; assuming row 0");
    0
}

/// Map known sheet labels to snake_case; month and unknown labels pass through.
pub fn normalize_column_name(label: &str) -> String {
    MetadataColumn::from_source_label(label)
        .map(|c| c.column_name().to_string())
        .unwrap_or_else(|| label.to_string())
}

pub fn normalize_column_names(labels: &[String]) -> Vec<String> {
    labels.iter().map(|l| normalize_column_name(l)).collect()
}
