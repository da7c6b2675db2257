use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Day zero of the Excel 1900 date system (serial 1 is 1900-01-01 after the leap-year bug).
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Excel serials accepted as month headers (1954-10-03 ..= 2119-01-11).
/// Narrower than "any number" so stray numeric headers are not read as dates.
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

// Slashed dates are month-first; `%d/%m/%Y` only catches days above 12.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y", "%d-%b-%y", "%d-%b-%Y", "%d %b %Y",
];

/// Month-level formats, parsed with the prefix (a `01` day) prepended.
const MONTH_FORMATS: &[(&str, &str)] = &[
    ("01 ", "%d %B %Y"),
    ("01-", "%d-%B-%Y"),
    ("01-", "%d-%Y-%m"),
];

fn first_of_month(d: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1)
}

/// Parses `Apr-21` / `Apr-2021`.
fn parse_short_month(s: &str) -> Option<NaiveDate> {
    let (mon, year) = s.split_once('-')?;
    if mon.len() != 3 || !mon.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !(year.len() == 2 || year.len() == 4) || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let fmt = if year.len() == 2 { "%d-%b-%y" } else { "%d-%b-%Y" };
    NaiveDate::parse_from_str(&format!("01-{s}"), fmt).ok()
}

/// Parses an Excel date serial such as `44287` or `44287.0`.
fn parse_excel_serial(s: &str) -> Option<NaiveDate> {
    let digits_and_dot = s.chars().all(|c| c.is_ascii_digit() || c == '.');
    if s.is_empty() || s.matches('.').count() > 1 || !digits_and_dot {
        return None;
    }
    let serial: f64 = s.parse().ok()?;
    if !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Lenient date parse for free-form cells: ISO dates and datetimes, slashed
/// day/month orders, and `Month YYYY` style labels.
pub fn parse_date_value(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    MONTH_FORMATS.iter().find_map(|(prefix, fmt)| {
        NaiveDate::parse_from_str(&format!("{prefix}{s}"), fmt).ok()
    })
}

/// Convert a month column header to the first day of that month.
///
/// Tried in order: `Mon-YY` / `Mon-YYYY`, Excel serials, then any date
/// [`parse_date_value`] understands.
pub fn parse_month_column(label: &str) -> Option<NaiveDate> {
    let s = label.trim();
    if s.is_empty() || matches!(s.to_lowercase().as_str(), "nan" | "none") {
        return None;
    }
    parse_short_month(s)
        .or_else(|| parse_excel_serial(s))
        .or_else(|| parse_date_value(s))
        .and_then(first_of_month)
}

pub fn is_month_column(label: &str) -> bool {
    parse_month_column(label).is_some()
}
