#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Column labels, taken from the detected header row of the sheet.
    pub headers: Vec<String>,
    /// Every row below the header row, padded to `headers.len()` fields.
    pub rows: Vec<Vec<String>>,
    /// Zero-based index of the header row within the file.
    pub header_row: usize,
}

impl RawTable {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}
