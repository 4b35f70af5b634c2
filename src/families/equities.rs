// src/families/equities.rs

use arrow::array::ArrayRef;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema::{Family, FamilySchema, FieldSpec, FieldType, NormalizedTable};
use crate::table::{float_array, int_array, text_array, CanonicalRow, Table};
use crate::transform::{coerce_rows, dedup_first_by, RowView, Transformed};

pub fn schema() -> FamilySchema {
    FamilySchema::new(
        Family::Equities,
        &["symbol"],
        vec![
            FieldSpec::required("symbol", FieldType::Utf8),
            FieldSpec::required("name", FieldType::Utf8),
            FieldSpec::optional("last_sale", FieldType::Float64).alias("lastsale"),
            FieldSpec::optional("market_cap", FieldType::Float64).alias("marketcap"),
            FieldSpec::optional("ipo_year", FieldType::Int64).alias("ipoyear"),
            FieldSpec::optional("sector", FieldType::Utf8),
            FieldSpec::optional("industry", FieldType::Utf8),
        ],
    )
    .dropping(&["summary quote"])
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuerRow {
    pub symbol: String,
    pub name: Option<String>,
    pub last_sale: Option<f64>,
    /// Dollars.
    pub market_cap: Option<f64>,
    pub ipo_year: Option<i64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl IssuerRow {
    fn from_view(r: &RowView) -> Result<Self> {
        Ok(Self {
            symbol: r.key("symbol")?,
            name: r.text("name"),
            last_sale: r.number("last_sale")?,
            market_cap: r.magnitude("market_cap")?,
            ipo_year: r.int("ipo_year")?,
            sector: r.text("sector"),
            industry: r.text("industry"),
        })
    }

    /// Nothing but the symbol is known.
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.last_sale.is_none()
            && self.market_cap.is_none()
            && self.ipo_year.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
    }
}

impl CanonicalRow for IssuerRow {
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            text_array(rows.iter().map(|r| Some(r.symbol.as_str()))),
            text_array(rows.iter().map(|r| r.name.as_deref())),
            float_array(rows.iter().map(|r| r.last_sale)),
            float_array(rows.iter().map(|r| r.market_cap)),
            int_array(rows.iter().map(|r| r.ipo_year)),
            text_array(rows.iter().map(|r| r.sector.as_deref())),
            text_array(rows.iter().map(|r| r.industry.as_deref())),
        ]
    }

    fn identity(&self) -> String {
        self.symbol.clone()
    }
}

/// Exchange lists: first listing of a symbol wins, then empty rows go.
///
/// Duplicates are dropped on the raw symbol before any value is coerced, so a
/// malformed first listing is excluded without a later one taking its place.
pub fn transform(schema: &FamilySchema, mut table: NormalizedTable) -> Result<Transformed> {
    let raw_rows: Vec<(usize, Vec<String>)> =
        std::mem::take(&mut table.rows).into_iter().enumerate().collect();
    let columns = &table.columns;
    // Rows without a symbol never collide; coercion excludes them.
    let (raw_rows, dropped) = dedup_first_by(raw_rows, |(i, row)| {
        RowView::new(columns, row).text("symbol").ok_or(*i)
    });
    if dropped > 0 {
        info!(family = %schema.family, dropped, "dropped duplicate symbols");
    }
    table.rows = raw_rows.into_iter().map(|(_, row)| row).collect();

    let (rows, excluded) = coerce_rows(schema.family, &table, IssuerRow::from_view);

    let before = rows.len();
    let rows: Vec<IssuerRow> = rows.into_iter().filter(|r| !r.is_empty()).collect();
    if rows.len() < before {
        debug!(family = %schema.family, removed = before - rows.len(), "removed empty rows");
    }

    Ok(Transformed {
        table: Table::from_rows(schema, &rows)?,
        excluded: table.excluded + excluded,
    })
}
