// src/source/infer.rs

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schema::FieldType;
use crate::transform::values::{clean_str, is_missing, is_numeric, parse_date};

/// Best-effort typing of one raw column, as reported alongside a `RawTable`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: FieldType,
}

const SAMPLE_LIMIT: usize = 1_000;

/// For each column, look at up to SAMPLE_LIMIT non-missing cells:
///  - On the first sample, remember its type
///  - On a later sample of a different type, mark the column Mixed
///  - A column with no samples at all defaults to Utf8
pub fn infer_columns(source_id: &str, headers: &[String], rows: &[Vec<String>]) -> Vec<Column> {
    if rows.iter().any(|r| r.len() > headers.len()) {
        warn!(
            source = source_id,
            headers = headers.len(),
            "some rows have more cells than headers"
        );
    }

    headers
        .iter()
        .enumerate()
        .map(|(idx, raw_name)| {
            let name = raw_name.trim().to_string();
            let mut first: Option<FieldType> = None;
            let mut mixed = false;

            let samples = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !is_missing(cell))
                .take(SAMPLE_LIMIT);

            for cell in samples {
                let inferred = infer_cell(cell);
                match first {
                    None => first = Some(inferred),
                    Some(prev) if prev != inferred => {
                        debug!(
                            source = source_id,
                            column = %name,
                            "conflicting samples: {:?} vs {:?}",
                            prev,
                            inferred
                        );
                        mixed = true;
                        break;
                    }
                    _ => {}
                }
            }

            let ty = match (mixed, first) {
                (true, _) => FieldType::Mixed,
                (false, Some(t)) => t,
                (false, None) => FieldType::Utf8,
            };
            Column { name, ty }
        })
        .collect()
}

fn infer_cell(raw: &str) -> FieldType {
    let v = clean_str(raw);
    if v.parse::<i64>().is_ok() {
        return FieldType::Int64;
    }
    if is_numeric(v) {
        return FieldType::Float64;
    }
    if parse_date(v).is_some() {
        return FieldType::Date;
    }
    FieldType::Utf8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn infers_per_column_types() {
        let headers = vec![
            " date ".to_string(),
            "ticker".into(),
            "close".into(),
            "volume".into(),
            "founded".into(),
            "empty".into(),
        ];
        let data = rows(&[
            &["2018-03-27", "AAPL", "168.34", "38962839", "1976", ""],
            &["2018-03-27", "MSFT", "89.47", "53704562", "1975 (2013)", "n/a"],
        ]);
        let cols = infer_columns("test", &headers, &data);
        let types: Vec<_> = cols.iter().map(|c| (c.name.as_str(), c.ty)).collect();
        assert_eq!(
            types,
            vec![
                ("date", FieldType::Date),
                ("ticker", FieldType::Utf8),
                ("close", FieldType::Float64),
                ("volume", FieldType::Int64),
                ("founded", FieldType::Mixed),
                ("empty", FieldType::Utf8),
            ]
        );
    }
}
