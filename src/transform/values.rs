// src/transform/values.rs

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::error::IngestError;

/// Characters stripped from the front of monetary values.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Spellings that mean "no value" in the sources we read.
const MISSING_MARKERS: &[&str] = &["", "n/a", "na", "nan", "none", "null", ".", "-", "--"];

static NUMERIC_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());

/// A single cell that failed coercion. Wrapped into a row-scoped
/// [`IngestError::ValueCoercion`] by [`ValueError::in_column`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueError {
    pub value: String,
    pub reason: &'static str,
}

impl ValueError {
    fn new(value: &str, reason: &'static str) -> Self {
        Self {
            value: value.to_string(),
            reason,
        }
    }

    pub fn in_column(self, column: &str) -> IngestError {
        IngestError::coercion(column, &self.value, self.reason)
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.value, self.reason)
    }
}

/// Trim whitespace and strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

pub fn is_missing(raw: &str) -> bool {
    let c = clean_str(raw);
    MISSING_MARKERS.iter().any(|m| c.eq_ignore_ascii_case(m))
}

/// Plain decimal or scientific notation, no separators or symbols.
pub fn is_numeric(s: &str) -> bool {
    NUMERIC_BODY.is_match(s)
}

/// Cleaned text, or `None` for missing markers.
pub fn parse_text(raw: &str) -> Option<String> {
    if is_missing(raw) {
        None
    } else {
        Some(clean_str(raw).to_string())
    }
}

/// Parse a locale-formatted number such as `"$1,234.50"` or `" 17 "`.
///
/// Missing markers give `Ok(None)`; anything else that is not numeric once
/// currency symbols, thousands separators and spaces are gone is an error.
pub fn parse_number(raw: &str) -> Result<Option<f64>, ValueError> {
    if is_missing(raw) {
        return Ok(None);
    }
    let stripped: String = clean_str(raw)
        .trim_start_matches(CURRENCY_SYMBOLS)
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if !NUMERIC_BODY.is_match(&stripped) {
        return Err(ValueError::new(raw, "not a number"));
    }
    stripped
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ValueError::new(raw, "not a number"))
}

/// Parse an integral value; `"2015.0"` is accepted, `"2015.5"` is not.
pub fn parse_int(raw: &str) -> Result<Option<i64>, ValueError> {
    match parse_number(raw)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(Some(v as i64)),
        Some(_) => Err(ValueError::new(raw, "not an integer")),
    }
}

/// Decode a unit-suffixed monetary magnitude: `"$1.21B"` → `1.21e9`.
///
/// Only `M` (×10⁶) and `B` (×10⁹) are recognized. A value without one of
/// those suffixes (including `"$0"`) is unknown and yields `Ok(None)`. A
/// recognized suffix on a non-numeric body is an error.
pub fn decode_magnitude(raw: &str) -> Result<Option<f64>, ValueError> {
    if is_missing(raw) {
        return Ok(None);
    }
    let value = clean_str(raw).trim_start_matches(CURRENCY_SYMBOLS).trim();
    let (body, factor) = match value.char_indices().last() {
        Some((i, 'M')) => (&value[..i], 1e6),
        Some((i, 'B')) => (&value[..i], 1e9),
        _ => return Ok(None),
    };
    let body: String = body.chars().filter(|c| *c != ',').collect();
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(ValueError::new(raw, "malformed magnitude body"));
    }
    body.parse::<f64>()
        .map(|v| Some(v * factor))
        .map_err(|_| ValueError::new(raw, "malformed magnitude body"))
}

/// Truncate a display name at its first parenthetical annotation.
pub fn truncate_name(raw: &str) -> String {
    match raw.split_once('(') {
        Some((head, _)) => head.trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Parse a calendar date in any of the layouts the sources use.
///
/// A leading ISO date followed by an annotation (`"1957-03-04 (1957)"`)
/// resolves to the leading date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    s.get(..10)
        .filter(|_| s[10..].starts_with(|c: char| c.is_whitespace() || c == '('))
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// A cell of a column whose values do not share one type.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
}

pub fn parse_mixed(raw: &str) -> Option<Cell> {
    if is_missing(raw) {
        return None;
    }
    let s = clean_str(raw);
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Int(i));
    }
    if NUMERIC_BODY.is_match(s) {
        if let Ok(f) = s.parse::<f64>() {
            return Some(Cell::Float(f));
        }
    }
    Some(Cell::Text(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_suffixes() {
        assert_eq!(decode_magnitude("$1.21B"), Ok(Some(1_210_000_000.0)));
        assert_eq!(decode_magnitude("$31.09M"), Ok(Some(31_090_000.0)));
        assert_eq!(decode_magnitude("\"$2.5M\""), Ok(Some(2_500_000.0)));
        assert_eq!(decode_magnitude("$1,204.5M"), Ok(Some(1_204_500_000.0)));
    }

    #[test]
    fn magnitude_without_suffix_is_missing() {
        assert_eq!(decode_magnitude("$0"), Ok(None));
        assert_eq!(decode_magnitude("$12.7"), Ok(None));
        assert_eq!(decode_magnitude("$1.5T"), Ok(None));
        assert_eq!(decode_magnitude("n/a"), Ok(None));
        assert_eq!(decode_magnitude(""), Ok(None));
    }

    #[test]
    fn magnitude_malformed_body_is_error() {
        let err = decode_magnitude("$abcM").unwrap_err();
        assert_eq!(err.value, "$abcM");
        assert!(decode_magnitude("$M").is_err());
        assert!(decode_magnitude("$1.2.3B").is_err());

        let ingest = err.in_column("market_cap");
        assert_eq!(ingest.kind(), crate::error::ErrorKind::ValueCoercionError);
    }

    #[test]
    fn names_truncate_at_first_parenthesis() {
        assert_eq!(
            truncate_name("1-800 FLOWERS.COM, Inc."),
            "1-800 FLOWERS.COM, Inc."
        );
        assert_eq!(truncate_name("ACME (Holdings)"), "ACME");
        assert_eq!(
            truncate_name("Apple Inc (AAPL) Prices, Dividends (Splits)"),
            "Apple Inc"
        );
    }

    #[test]
    fn locale_numbers() {
        assert_eq!(parse_number("1,234.50"), Ok(Some(1234.5)));
        assert_eq!(parse_number(" $17 "), Ok(Some(17.0)));
        assert_eq!(parse_number("-0.25"), Ok(Some(-0.25)));
        assert_eq!(parse_number("1e3"), Ok(Some(1000.0)));
        assert_eq!(parse_number("n/a"), Ok(None));
        assert_eq!(parse_number("."), Ok(None));
        assert!(parse_number("twelve").is_err());
        assert!(parse_number("inf").is_err());
    }

    #[test]
    fn integers() {
        assert_eq!(parse_int("2015"), Ok(Some(2015)));
        assert_eq!(parse_int("2015.0"), Ok(Some(2015)));
        assert_eq!(parse_int("n/a"), Ok(None));
        assert!(parse_int("2015.5").is_err());
    }

    #[test]
    fn dates() {
        let d = NaiveDate::from_ymd_opt(1957, 3, 4).unwrap();
        assert_eq!(parse_date("1957-03-04"), Some(d));
        assert_eq!(parse_date("1957/03/04"), Some(d));
        assert_eq!(parse_date("03/04/1957"), Some(d));
        assert_eq!(parse_date("1957-03-04 00:00:00"), Some(d));
        assert_eq!(parse_date("1957-03-04 (1957)"), Some(d));
        assert_eq!(parse_date("sometime in 1957"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn mixed_cells() {
        assert_eq!(parse_mixed("1902"), Some(Cell::Int(1902)));
        assert_eq!(parse_mixed("2.5"), Some(Cell::Float(2.5)));
        assert_eq!(
            parse_mixed("2013 (1888)"),
            Some(Cell::Text("2013 (1888)".into()))
        );
        assert_eq!(parse_mixed(""), None);
        assert_eq!(serde_json::to_string(&Cell::Int(1902)).unwrap(), "1902");
        assert_eq!(
            serde_json::to_string(&Cell::Text("1888/2013".into())).unwrap(),
            "\"1888/2013\""
        );
    }
}
