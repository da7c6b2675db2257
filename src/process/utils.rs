use once_cell::sync::Lazy;
use regex::Regex;

/// Cell contents the source sheet uses for "no value".
const NULL_TOKENS: [&str; 6] = ["", "na", "nan", "none", "--", "closed"];

/// `(123)` / `( 123.45 )` accounting negatives, after commas are gone.
static PAREN_NEGATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(\s*(\d+(?:\.\d+)?)\s*\)$").expect("valid regex"));

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Clean a categorical cell: trimmed text, with empty and `"0"` mapped to `None`.
pub fn clean_string_value(raw: &str) -> Option<String> {
    let s = clean_str(raw);
    if s.is_empty() || s == "0" {
        None
    } else {
        Some(s)
    }
}

/// 3) Parse a numeric cell.
///
/// Handles thousand separators, `%` suffixes, accounting-style parenthesised
/// negatives and the null tokens the sheet uses. Values are divided by 100 when
/// the cell carries `%` or the row's parameter is itself a percentage.
pub fn parse_numeric_value(raw: &str, is_percent_parameter: bool) -> Option<f64> {
    let s = clean_str(raw);
    if NULL_TOKENS.contains(&s.to_lowercase().as_str()) {
        return None;
    }

    let without_commas = s.replace(',', "");
    let is_percent_value = without_commas.contains('%');
    let mut cleaned = without_commas.replace('%', "").trim().to_string();

    if let Some(caps) = PAREN_NEGATIVE.captures(&cleaned) {
        cleaned = format!("-{}", &caps[1]);
    }

    let value: f64 = cleaned.parse().ok()?;
    if is_percent_parameter || is_percent_value {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

/// The sheet encodes margin rows with a bare `%` as the parameter name.
pub fn is_percent_parameter(parameter: Option<&str>) -> bool {
    parameter.map(str::trim) == Some("%")
}
