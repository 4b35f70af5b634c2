// src/transform/mod.rs

pub mod dedup;
pub mod resample;
pub mod values;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::schema::{Family, NormalizedTable};
use crate::table::Table;
use values::{Cell, ValueError};

pub use dedup::dedup_first_by;
pub use resample::{business_day, resample_business_mean};

/// Output of a family transform.
#[derive(Debug)]
pub struct Transformed {
    pub table: Table,
    /// Rows excluded along the way, including those dropped by the normalizer.
    pub excluded: usize,
}

/// Named access to the cells of one normalized row.
pub struct RowView<'a> {
    columns: &'a [String],
    row: &'a [String],
}

impl<'a> RowView<'a> {
    pub fn new(columns: &'a [String], row: &'a [String]) -> Self {
        Self { columns, row }
    }

    /// Raw cell text; empty when the column is absent.
    pub fn raw(&self, column: &str) -> &'a str {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.row.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn text(&self, column: &str) -> Option<String> {
        values::parse_text(self.raw(column))
    }

    /// Non-missing text, or a coercion error.
    pub fn key(&self, column: &str) -> Result<String> {
        self.text(column)
            .ok_or_else(|| IngestError::coercion(column, self.raw(column), "missing identity value"))
    }

    pub fn number(&self, column: &str) -> Result<Option<f64>> {
        self.lift(column, values::parse_number)
    }

    pub fn int(&self, column: &str) -> Result<Option<i64>> {
        self.lift(column, values::parse_int)
    }

    pub fn magnitude(&self, column: &str) -> Result<Option<f64>> {
        self.lift(column, values::decode_magnitude)
    }

    pub fn mixed(&self, column: &str) -> Option<Cell> {
        values::parse_mixed(self.raw(column))
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate> {
        let raw = self.raw(column);
        values::parse_date(raw).ok_or_else(|| IngestError::coercion(column, raw, "not a date"))
    }

    /// Optional date; unparsable cells become missing.
    pub fn date_opt(&self, column: &str) -> Option<NaiveDate> {
        let raw = self.raw(column);
        let parsed = values::parse_date(raw);
        if parsed.is_none() && !values::is_missing(raw) {
            debug!(column, value = raw, "unparsable optional date treated as missing");
        }
        parsed
    }

    fn lift<T>(
        &self,
        column: &str,
        f: impl Fn(&str) -> std::result::Result<Option<T>, ValueError>,
    ) -> Result<Option<T>> {
        f(self.raw(column)).map_err(|e| e.in_column(column))
    }
}

/// Coerce every row of `table` with `f`, in parallel, keeping source order.
///
/// Rows for which `f` fails are logged and excluded; the number excluded is
/// returned alongside the rows that survived.
pub fn coerce_rows<T, F>(family: Family, table: &NormalizedTable, f: F) -> (Vec<T>, usize)
where
    T: Send,
    F: Fn(&RowView) -> Result<T> + Sync,
{
    let columns = table.columns.as_slice();
    let results: Vec<Result<T>> = table
        .rows
        .par_iter()
        .map(|row| f(&RowView::new(columns, row)))
        .collect();

    let mut rows = Vec::with_capacity(results.len());
    let mut excluded = 0;
    for (row_no, res) in results.into_iter().enumerate() {
        match res {
            Ok(r) => rows.push(r),
            Err(err) => {
                warn!(%family, row = row_no, error = %err, "excluding row");
                excluded += 1;
            }
        }
    }
    (rows, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> NormalizedTable {
        NormalizedTable {
            source_id: "test".into(),
            columns: vec!["symbol".into(), "market_cap".into()],
            index: vec!["symbol".into()],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            excluded: 0,
        }
    }

    #[test]
    fn bad_rows_are_excluded_in_order() {
        let t = table(&[
            &["AAPL", "$1.1B"],
            &["BAD", "$xyzM"],
            &["PIH", "$43.08M"],
            &["", "$1M"],
        ]);
        let (rows, excluded) = coerce_rows(Family::Equities, &t, |r| {
            Ok((r.key("symbol")?, r.magnitude("market_cap")?))
        });
        assert_eq!(excluded, 2);
        assert_eq!(
            rows,
            vec![
                ("AAPL".to_string(), Some(1_100_000_000.0)),
                ("PIH".to_string(), Some(43_080_000.0)),
            ]
        );
    }

    #[test]
    fn absent_column_reads_as_missing() {
        let columns = vec!["symbol".to_string()];
        let row = vec!["AAPL".to_string()];
        let view = RowView::new(&columns, &row);
        assert_eq!(view.raw("sector"), "");
        assert_eq!(view.text("sector"), None);
        assert_eq!(view.number("sector").unwrap(), None);
        assert_eq!(view.date_opt("sector"), None);
        assert!(view.date("sector").is_err());
    }
}
