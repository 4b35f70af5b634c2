// src/schema/normalize.rs

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

use super::types::{FamilySchema, FieldType};
use crate::error::{IngestError, Result};
use crate::source::RawTable;
use crate::transform::values::parse_date;

/// Case-fold, trim and collapse internal whitespace.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A raw table renamed and reshaped onto a family's canonical columns.
///
/// Cells are still text; typing happens in the family transform.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub source_id: String,
    /// Canonical column names, identity columns first.
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped while normalizing (unparsable identity values).
    pub excluded: usize,
}

impl NormalizedTable {
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Map `raw` onto `schema`.
///
/// Every schema field becomes a column; optional fields the source lacks
/// are filled with empty cells. Source columns without a field are dropped.
pub fn normalize(raw: RawTable, schema: &FamilySchema) -> Result<NormalizedTable> {
    let family = schema.family;

    // 1) normalized header → first raw position
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (i, h) in raw.headers.iter().enumerate() {
        let name = normalize_header(h);
        if positions.contains_key(&name) {
            warn!(%family, column = %h, "duplicate source header, keeping first");
            continue;
        }
        positions.insert(name, i);
    }

    // 2) resolve each canonical field, identity columns first
    let mut ordered: Vec<_> = schema
        .fields
        .iter()
        .filter(|f| schema.index.contains(&f.name))
        .collect();
    ordered.sort_by_key(|f| schema.index.iter().position(|i| i == &f.name));
    ordered.extend(schema.fields.iter().filter(|f| !schema.index.contains(&f.name)));

    let mut columns = Vec::with_capacity(ordered.len());
    let mut sources: Vec<Option<usize>> = Vec::with_capacity(ordered.len());
    for field in &ordered {
        let found = field
            .accepted_names()
            .find_map(|n| positions.get(&normalize_header(n)).copied());
        if found.is_none() {
            if field.required {
                return Err(IngestError::SchemaMismatch {
                    family: family.to_string(),
                    column: field.name.clone(),
                });
            }
            debug!(%family, column = %field.name, "optional column absent, filling empty");
        }
        columns.push(field.name.clone());
        sources.push(found);
    }

    // 3) log what gets left behind
    let used: Vec<usize> = sources.iter().flatten().copied().collect();
    for (i, h) in raw.headers.iter().enumerate() {
        if used.contains(&i) {
            continue;
        }
        let name = normalize_header(h);
        if name.is_empty() {
            trace!(%family, position = i, "dropping unnamed column");
        } else if schema.drop.iter().any(|d| normalize_header(d) == name) {
            trace!(%family, column = %h, "dropping non-essential column");
        } else {
            debug!(%family, column = %h, "dropping unknown column");
        }
    }

    let mut rows: Vec<Vec<String>> = raw
        .rows
        .into_iter()
        .map(|row| {
            sources
                .iter()
                .map(|src| src.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    let mut table = NormalizedTable {
        source_id: raw.source_id,
        columns,
        index: schema.index.clone(),
        rows: Vec::new(),
        excluded: 0,
    };

    if schema.strict_index {
        rows = sort_strict(&mut table, schema, rows)?;
    }
    table.rows = rows;
    Ok(table)
}

/// Sort by the identity key and fail on any duplicate.
///
/// Date identity cells that do not parse exclude their row.
fn sort_strict(
    table: &mut NormalizedTable,
    schema: &FamilySchema,
    rows: Vec<Vec<String>>,
) -> Result<Vec<Vec<String>>> {
    let family = schema.family;
    let key_cols: Vec<(usize, FieldType)> = schema
        .index
        .iter()
        .enumerate()
        .map(|(pos, name)| (pos, schema.field(name).map_or(FieldType::Utf8, |f| f.ty)))
        .collect();

    let mut keyed: Vec<(Vec<KeyPart>, Vec<String>)> = Vec::with_capacity(rows.len());
    for (row_no, row) in rows.into_iter().enumerate() {
        let mut key = Vec::with_capacity(key_cols.len());
        let mut bad = None;
        for (pos, ty) in &key_cols {
            let cell = row[*pos].trim();
            match ty {
                FieldType::Date => match parse_date(cell) {
                    Some(d) => key.push(KeyPart::Date(d)),
                    None => {
                        bad = Some(IngestError::coercion(&table.columns[*pos], cell, "not a date"));
                        break;
                    }
                },
                _ => key.push(KeyPart::Text(cell.to_string())),
            }
        }
        match bad {
            Some(err) => {
                warn!(%family, row = row_no, error = %err, "excluding row");
                table.excluded += 1;
            }
            None => keyed.push((key, row)),
        }
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(pair) = keyed.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(IngestError::IndexNotUnique {
            family: family.to_string(),
            key: format!("{:?}", pair[0].0),
        });
    }
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Date(NaiveDate),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{Family, FieldSpec};

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            "test",
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn listing_schema() -> FamilySchema {
        FamilySchema::new(
            Family::Equities,
            &["symbol"],
            vec![
                FieldSpec::required("symbol", FieldType::Utf8),
                FieldSpec::required("name", FieldType::Utf8),
                FieldSpec::optional("market_cap", FieldType::Float64).alias("marketcap"),
                FieldSpec::optional("sector", FieldType::Utf8),
            ],
        )
        .dropping(&["summary quote"])
    }

    fn price_schema() -> FamilySchema {
        FamilySchema::new(
            Family::WikiPrices,
            &["date", "ticker"],
            vec![
                FieldSpec::required("ticker", FieldType::Utf8),
                FieldSpec::required("date", FieldType::Date),
                FieldSpec::required("close", FieldType::Float64),
            ],
        )
        .strict()
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("  GICS   Sub-Industry \t"), "gics sub-industry");
        assert_eq!(normalize_header("IPOyear"), "ipoyear");
    }

    #[test]
    fn maps_aliases_drops_extras_and_fills_optional() {
        let t = normalize(
            raw(
                &[" Name ", "SYMBOL", "MarketCap", "Summary Quote", ""],
                &[&["Apple", "AAPL", "$1.1B", "https://x", ""]],
            ),
            &listing_schema(),
        )
        .unwrap();
        assert_eq!(t.columns, vec!["symbol", "name", "market_cap", "sector"]);
        assert_eq!(t.rows, vec![vec!["AAPL", "Apple", "$1.1B", ""]]);
        assert_eq!(t.index, vec!["symbol"]);
    }

    #[test]
    fn missing_required_column_is_schema_mismatch() {
        let err = normalize(raw(&["Symbol"], &[&["AAPL"]]), &listing_schema()).unwrap_err();
        assert!(matches!(
            &err,
            IngestError::SchemaMismatch { column, .. } if column == "name"
        ));
    }

    #[test]
    fn strict_index_sorts_by_date_then_ticker() {
        let t = normalize(
            raw(
                &["ticker", "date", "close"],
                &[
                    &["MSFT", "2018-03-27", "89.47"],
                    &["AAPL", "2018-03-27", "168.34"],
                    &["MSFT", "2018-03-26", "93.78"],
                ],
            ),
            &price_schema(),
        )
        .unwrap();
        assert_eq!(t.columns, vec!["date", "ticker", "close"]);
        let keys: Vec<_> = t.rows.iter().map(|r| (r[0].as_str(), r[1].as_str())).collect();
        assert_eq!(
            keys,
            vec![
                ("2018-03-26", "MSFT"),
                ("2018-03-27", "AAPL"),
                ("2018-03-27", "MSFT")
            ]
        );
    }

    #[test]
    fn strict_index_rejects_duplicates() {
        let err = normalize(
            raw(
                &["ticker", "date", "close"],
                &[
                    &["AAPL", "2018-03-27", "168.34"],
                    &["AAPL", "2018-03-27", "168.35"],
                ],
            ),
            &price_schema(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexNotUnique);
    }

    #[test]
    fn strict_index_excludes_unparsable_dates() {
        let t = normalize(
            raw(
                &["ticker", "date", "close"],
                &[&["AAPL", "not-a-date", "1"], &["AAPL", "2018-03-27", "2"]],
            ),
            &price_schema(),
        )
        .unwrap();
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.excluded, 1);
    }
}
