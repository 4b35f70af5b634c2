// src/families/instruments.rs

use arrow::array::ArrayRef;
use tracing::info;

use crate::error::Result;
use crate::schema::{Family, FamilySchema, FieldSpec, FieldType, NormalizedTable};
use crate::table::{text_array, CanonicalRow, Table};
use crate::transform::{coerce_rows, dedup_first_by, values::truncate_name, RowView, Transformed};

pub fn schema() -> FamilySchema {
    FamilySchema::new(
        Family::WikiStocks,
        &["ticker"],
        vec![
            FieldSpec::required("ticker", FieldType::Utf8).alias("code"),
            FieldSpec::required("name", FieldType::Utf8),
        ],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRow {
    pub ticker: String,
    pub name: Option<String>,
}

impl InstrumentRow {
    fn from_view(r: &RowView) -> Result<Self> {
        Ok(Self {
            ticker: r.key("ticker")?,
            name: r.text("name").map(|n| truncate_name(&n)),
        })
    }
}

impl CanonicalRow for InstrumentRow {
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            text_array(rows.iter().map(|r| Some(r.ticker.as_str()))),
            text_array(rows.iter().map(|r| r.name.as_deref())),
        ]
    }

    fn identity(&self) -> String {
        self.ticker.clone()
    }
}

pub fn transform(schema: &FamilySchema, table: NormalizedTable) -> Result<Transformed> {
    let (rows, excluded) = coerce_rows(schema.family, &table, InstrumentRow::from_view);
    let (rows, dropped) = dedup_first_by(rows, |r| r.identity());
    if dropped > 0 {
        info!(family = %schema.family, dropped, "dropped duplicate tickers");
    }
    Ok(Transformed {
        table: Table::from_rows(schema, &rows)?,
        excluded: table.excluded + excluded,
    })
}
