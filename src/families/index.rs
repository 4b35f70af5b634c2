// src/families/index.rs

use arrow::array::ArrayRef;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::error::Result;
use crate::schema::{Family, FamilySchema, FieldSpec, FieldType, NormalizedTable};
use crate::table::{date_array, float_array, mixed_array, text_array, CanonicalRow, Table};
use crate::transform::{coerce_rows, dedup_first_by, values::Cell, RowView, Transformed};

/// `date`, `level`; the configured series id is accepted as the level header.
pub fn level_schema(feed: &FeedConfig) -> FamilySchema {
    let mut level = FieldSpec::required("level", FieldType::Float64);
    for s in &feed.series {
        level = level.alias(&s.id);
    }
    FamilySchema::new(
        Family::IndexPrices,
        &["date"],
        vec![FieldSpec::required("date", FieldType::Date), level],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelRow {
    pub date: NaiveDate,
    pub level: f64,
}

impl CanonicalRow for LevelRow {
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            date_array(rows.iter().map(|r| Some(r.date))),
            float_array(rows.iter().map(|r| Some(r.level))),
        ]
    }

    fn identity(&self) -> String {
        self.date.to_string()
    }
}

/// Index levels: days without a level are dropped, dates unique and ascending.
pub fn transform_levels(schema: &FamilySchema, table: NormalizedTable) -> Result<Transformed> {
    let (rows, excluded) = coerce_rows(schema.family, &table, |r| {
        Ok((r.date("date")?, r.number("level")?))
    });
    let observed = rows.len();
    let rows: Vec<LevelRow> = rows
        .into_iter()
        .filter_map(|(date, level)| level.map(|level| LevelRow { date, level }))
        .collect();
    debug!(family = %schema.family, missing = observed - rows.len(), "skipped days without a level");

    let (mut rows, dropped) = dedup_first_by(rows, |r| r.date);
    if dropped > 0 {
        info!(family = %schema.family, dropped, "dropped duplicate dates");
    }
    rows.sort_by_key(|r| r.date);

    Ok(Transformed {
        table: Table::from_rows(schema, &rows)?,
        excluded: table.excluded + excluded,
    })
}

pub fn constituents_schema() -> FamilySchema {
    FamilySchema::new(
        Family::IndexStocks,
        &["ticker"],
        vec![
            FieldSpec::required("ticker", FieldType::Utf8).alias("symbol"),
            FieldSpec::required("name", FieldType::Utf8).alias("security"),
            FieldSpec::optional("gics_sector", FieldType::Utf8).alias("gics sector"),
            FieldSpec::optional("gics_sub_industry", FieldType::Utf8).alias("gics sub-industry"),
            FieldSpec::optional("location", FieldType::Utf8)
                .alias("headquarters location")
                .alias("address of headquarters"),
            FieldSpec::optional("first_added", FieldType::Date).alias("date first added"),
            FieldSpec::optional("cik", FieldType::Utf8),
            FieldSpec::optional("founded", FieldType::Mixed),
        ],
    )
    .dropping(&["sec filings"])
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstituentRow {
    pub ticker: String,
    pub name: Option<String>,
    pub gics_sector: Option<String>,
    pub gics_sub_industry: Option<String>,
    pub location: Option<String>,
    pub first_added: Option<NaiveDate>,
    /// Registration id, kept as text so leading zeros survive.
    pub cik: Option<String>,
    pub founded: Option<Cell>,
}

impl ConstituentRow {
    fn from_view(r: &RowView) -> Result<Self> {
        Ok(Self {
            ticker: r.key("ticker")?,
            name: r.text("name"),
            gics_sector: r.text("gics_sector"),
            gics_sub_industry: r.text("gics_sub_industry"),
            location: r.text("location"),
            first_added: r.date_opt("first_added"),
            cik: r.text("cik"),
            founded: r.mixed("founded"),
        })
    }
}

impl CanonicalRow for ConstituentRow {
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            text_array(rows.iter().map(|r| Some(r.ticker.as_str()))),
            text_array(rows.iter().map(|r| r.name.as_deref())),
            text_array(rows.iter().map(|r| r.gics_sector.as_deref())),
            text_array(rows.iter().map(|r| r.gics_sub_industry.as_deref())),
            text_array(rows.iter().map(|r| r.location.as_deref())),
            date_array(rows.iter().map(|r| r.first_added)),
            text_array(rows.iter().map(|r| r.cik.as_deref())),
            mixed_array(rows.iter().map(|r| r.founded.as_ref())),
        ]
    }

    fn identity(&self) -> String {
        self.ticker.clone()
    }
}

pub fn transform_constituents(
    schema: &FamilySchema,
    table: NormalizedTable,
) -> Result<Transformed> {
    let (rows, excluded) = coerce_rows(schema.family, &table, ConstituentRow::from_view);
    let (rows, dropped) = dedup_first_by(rows, |r| r.identity());
    if dropped > 0 {
        info!(family = %schema.family, dropped, "dropped duplicate tickers");
    }
    Ok(Transformed {
        table: Table::from_rows(schema, &rows)?,
        excluded: table.excluded + excluded,
    })
}
