// Utility helpers for parsing and formatting.
//
// All the "dirty" spreadsheet handling lives here so the rest of the crate can
// assume clean, typed values.
use crate::types::{RawCell, YearMonth};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use num_format::{CustomFormat, Grouping, ToFormattedString};
use once_cell::sync::Lazy;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

// Paraguayan convention: `.` groups thousands.
static THOUSANDS: Lazy<CustomFormat> = Lazy::new(|| {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator(".")
        .decimal(",")
        .build()
        .unwrap_or_default()
});

const MONTHS_ES: [&str; 12] = [
    "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio",
    "Julio", "Agosto", "Septiembre", "Octubre", "Noviembre", "Diciembre",
];

/// Values that spreadsheet exports use to mean "nothing here".
pub fn is_missing_marker(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "" | "nan" | "none" | "null" | "nat" | "<na>" | "n/a"
    )
}

/// Parse a date cell. Text is tried as ISO first, then day-first (`dd/mm/yyyy`).
/// Bare numbers are read as Excel serial days.
pub fn parse_date_safe(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::Date(d) => Some(*d),
        RawCell::Number(n) => excel_serial_to_date(*n),
        RawCell::Text(s) => parse_date_str(s),
        RawCell::Empty => None,
    }
}

pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // 2958465 is 9999-12-31; anything outside is not a date.
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    // Day 0 is 1899-12-30 because Excel counts the nonexistent 1900-02-29.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Parse a numeric cell using the local convention: `.` groups thousands, `,` marks decimals.
///
/// - Typed numbers pass through untouched.
/// - Text has every `.` and space stripped, then `,` becomes the decimal point.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_number_safe(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(n) if n.is_finite() => Some(*n),
        RawCell::Text(s) => {
            let s = s.trim();
            if is_missing_marker(s) {
                return None;
            }
            // "1.234,5" -> "1234.5"
            let cleaned: String = s
                .chars()
                .filter(|c| *c != '.' && !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Integer coercion without separator stripping; fractional parts are truncated.
pub fn parse_int_safe(cell: &RawCell) -> Option<i64> {
    match cell {
        RawCell::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        RawCell::Text(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                return Some(v);
            }
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
        }
        _ => None,
    }
}

/// Division that yields 0 instead of infinity or NaN when the divisor is zero.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// Integer with `.` thousand separators, e.g. `1.234.567`.
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&*THOUSANDS)
}

/// Round to whole units, then group thousands. Used by the KPI strip.
pub fn format_rounded(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    format_int(n.round() as i64)
}

/// Drop the fractional part, then group thousands. Used by table cells.
pub fn format_truncated(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    format_int(n.trunc() as i64)
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

pub fn month_name(month: u32) -> &'static str {
    MONTHS_ES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("")
}

/// Short chart label such as `Marzo 24`.
pub fn month_label(ym: YearMonth) -> String {
    format!("{} {:02}", month_name(ym.month), ym.year.rem_euclid(100))
}
