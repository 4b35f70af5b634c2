// src/source/delimited.rs

use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::debug;

use super::{DelimitedSource, RawTable};
use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use crate::schema::normalize::normalize_header;

/// Read every location of `src` and concatenate their rows.
///
/// All parts must agree on their header (compared after case-folding and
/// whitespace normalization); the first part's spelling is kept.
pub async fn read<F: Fetch>(fetcher: &F, src: &DelimitedSource) -> Result<RawTable> {
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut ids = Vec::with_capacity(src.locations.len());

    for location in &src.locations {
        let id = location.to_string();
        let text = location.read_text(fetcher).await?;
        let (part_headers, part_rows) = parse_delimited(&id, &text, src.delimiter)?;
        debug!(source = %id, rows = part_rows.len(), "parsed delimited part");

        match &headers {
            None => headers = Some(part_headers),
            Some(first) => {
                let a: Vec<_> = first.iter().map(|h| normalize_header(h)).collect();
                let b: Vec<_> = part_headers.iter().map(|h| normalize_header(h)).collect();
                if a != b {
                    return Err(IngestError::format(
                        &id,
                        format!("header {:?} does not match {:?}", b, a),
                    ));
                }
            }
        }
        rows.extend(part_rows);
        ids.push(id);
    }

    let headers = headers.ok_or_else(|| IngestError::format("<none>", "no locations configured"))?;
    Ok(RawTable::new(ids.join(","), headers, rows))
}

/// Split delimited text into (headers, rows).
///
/// Records may have differing field counts; the normalizer only looks at
/// cells that sit under a header.
pub fn parse_delimited(
    source_id: &str,
    text: &str,
    delimiter: u8,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim_start().starts_with('<') {
        return Err(IngestError::format(
            source_id,
            "content looks like markup, not delimited text",
        ));
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(text.as_bytes()));

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| IngestError::format(source_id, format!("reading header: {}", e)))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::format(source_id, "missing header row"));
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            IngestError::format(source_id, format!("parse error at record {}: {}", idx, e))
        })?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok((headers, rows))
}
