// src/families/prices.rs

use arrow::array::ArrayRef;
use chrono::NaiveDate;

use crate::error::Result;
use crate::schema::{Family, FamilySchema, FieldSpec, FieldType, NormalizedTable};
use crate::table::{date_array, float_array, text_array, CanonicalRow, Table};
use crate::transform::{coerce_rows, RowView, Transformed};

/// Numeric columns after the (date, ticker) key, in stored order.
pub const VALUE_COLUMNS: [&str; 12] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "ex_dividend",
    "split_ratio",
    "adj_open",
    "adj_high",
    "adj_low",
    "adj_close",
    "adj_volume",
];

pub fn schema() -> FamilySchema {
    let mut fields = vec![
        FieldSpec::required("date", FieldType::Date),
        FieldSpec::required("ticker", FieldType::Utf8).alias("symbol"),
    ];
    for name in VALUE_COLUMNS {
        let field = if name == "close" {
            FieldSpec::required(name, FieldType::Float64)
        } else {
            FieldSpec::optional(name, FieldType::Float64)
        };
        // wiki dumps spell these with hyphens or spaces
        let field = match name {
            "ex_dividend" => field.alias("ex-dividend"),
            "split_ratio" => field.alias("split ratio"),
            _ => field.alias(&name.replace('_', "-")),
        };
        fields.push(field);
    }
    FamilySchema::new(Family::WikiPrices, &["date", "ticker"], fields).strict()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub values: [Option<f64>; 12],
}

impl PriceRow {
    fn from_view(r: &RowView) -> Result<Self> {
        let mut values = [None; 12];
        for (slot, name) in values.iter_mut().zip(VALUE_COLUMNS) {
            *slot = r.number(name)?;
        }
        Ok(Self {
            date: r.date("date")?,
            ticker: r.key("ticker")?,
            values,
        })
    }
}

impl CanonicalRow for PriceRow {
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        let mut arrays = vec![
            date_array(rows.iter().map(|r| Some(r.date))),
            text_array(rows.iter().map(|r| Some(r.ticker.as_str()))),
        ];
        for i in 0..VALUE_COLUMNS.len() {
            arrays.push(float_array(rows.iter().map(|r| r.values[i])));
        }
        arrays
    }

    fn identity(&self) -> String {
        format!("{}/{}", self.date, self.ticker)
    }
}

/// Coerce the (already sorted, unique) price rows in parallel.
pub fn transform(schema: &FamilySchema, table: NormalizedTable) -> Result<Transformed> {
    let (rows, excluded) = coerce_rows(schema.family, &table, PriceRow::from_view);
    Ok(Transformed {
        table: Table::from_rows(schema, &rows)?,
        excluded: table.excluded + excluded,
    })
}
