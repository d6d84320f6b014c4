//! Converts heterogeneous date cells into `NaiveDateTime`.
//!
//! Text goes through a fixed, day-first list of explicit formats before any
//! generic inference is attempted, so `01/02/2024` is always the first of
//! February. Numbers are spreadsheet serials counted from 1899-12-30.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::UnconvertibleValue;
use crate::models::CellValue;

/// Year token width a pattern expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YearToken {
    Leading4,
    Trailing4,
    Trailing2,
}

#[derive(Debug, Clone, Copy)]
struct DatePattern {
    format: &'static str,
    year: YearToken,
    with_time: bool,
}

const fn pattern(format: &'static str, year: YearToken, with_time: bool) -> DatePattern {
    DatePattern {
        format,
        year,
        with_time,
    }
}

const PATTERNS: [DatePattern; 9] = [
    pattern("%d/%m/%Y", YearToken::Trailing4, false),
    pattern("%d-%m-%Y", YearToken::Trailing4, false),
    pattern("%Y-%m-%d", YearToken::Leading4, false),
    pattern("%d/%m/%y", YearToken::Trailing2, false),
    pattern("%d-%m-%y", YearToken::Trailing2, false),
    pattern("%Y/%m/%d", YearToken::Leading4, false),
    pattern("%d/%m/%Y %H:%M:%S", YearToken::Trailing4, true),
    pattern("%d-%m-%Y %H:%M:%S", YearToken::Trailing4, true),
    pattern("%Y-%m-%d %H:%M:%S", YearToken::Leading4, true),
];

const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const FALLBACK_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%d.%m.%Y", "%Y.%m.%d", "%d %b %Y", "%b %d %Y"];

/// Serials beyond this many days are treated as garbage rather than dates.
const MAX_SERIAL_DAYS: f64 = 2_958_465.0;

pub fn normalize_date(cell: &CellValue) -> Result<NaiveDateTime, UnconvertibleValue> {
    match cell {
        CellValue::Empty => Err(UnconvertibleValue::new("", "empty cell")),
        CellValue::DateTime(datetime) => Ok(*datetime),
        CellValue::Text(text) => parse_date_text(text),
        CellValue::Number(serial) => from_spreadsheet_serial(*serial),
        CellValue::Bool(value) => Err(UnconvertibleValue::new(value.to_string(), "boolean cell")),
    }
}

pub fn parse_date_text(text: &str) -> Result<NaiveDateTime, UnconvertibleValue> {
    let cleaned = clean_date_text(text);
    if cleaned.is_empty() {
        return Err(UnconvertibleValue::new(text, "no date characters"));
    }

    for candidate in PATTERNS.iter() {
        if !year_token_matches(&cleaned, candidate.year) {
            continue;
        }
        let parsed = if candidate.with_time {
            NaiveDateTime::parse_from_str(&cleaned, candidate.format).ok()
        } else {
            NaiveDate::parse_from_str(&cleaned, candidate.format)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        };
        if let Some(datetime) = parsed {
            return Ok(datetime);
        }
    }

    infer_date(text.trim()).ok_or_else(|| UnconvertibleValue::new(text, "unrecognized date format"))
}

/// Spreadsheet serial day count with epoch 1899-12-30; fractions become time of day.
pub fn from_spreadsheet_serial(serial: f64) -> Result<NaiveDateTime, UnconvertibleValue> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL_DAYS {
        return Err(UnconvertibleValue::new(serial.to_string(), "serial out of range"));
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|date| date.and_time(NaiveTime::MIN))
        .ok_or_else(|| UnconvertibleValue::new(serial.to_string(), "invalid epoch"))?;
    let offset = Duration::milliseconds((serial * 86_400_000.0).round() as i64);
    epoch
        .checked_add_signed(offset)
        .ok_or_else(|| UnconvertibleValue::new(serial.to_string(), "serial out of range"))
}

/// Keeps digits, `/`, `-`, `:` and single spaces between runs.
fn clean_date_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_digit() || matches!(c, '/' | '-' | ':') {
            cleaned.push(c);
        } else if c.is_whitespace() && !cleaned.ends_with(' ') {
            cleaned.push(' ');
        }
    }
    cleaned.trim().to_string()
}

fn year_token_matches(cleaned: &str, year: YearToken) -> bool {
    let date_part = cleaned.split(' ').next().unwrap_or_default();
    let tokens: Vec<&str> = date_part.split(['/', '-']).collect();
    if tokens.len() != 3 {
        return false;
    }
    match year {
        YearToken::Leading4 => tokens[0].len() == 4,
        YearToken::Trailing4 => tokens[2].len() == 4,
        YearToken::Trailing2 => tokens[2].len() == 2,
    }
}

/// Last-resort parse over common unambiguous and month-first layouts.
fn infer_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.naive_local());
    }
    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime);
        }
    }
    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    compact_date(text)
}

/// `YYYYMMDD`.
fn compact_date(text: &str) -> Option<NaiveDateTime> {
    if text.len() != 8 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = text[0..4].parse().ok()?;
    let month = text[4..6].parse().ok()?;
    let day = text[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.and_time(NaiveTime::MIN))
}
