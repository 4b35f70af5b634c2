// src/source/feed.rs

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::Url;

use super::{delimited::parse_delimited, RawTable, SeriesFeedSource};
use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use crate::transform::values::{is_missing, parse_date};

/// URL of one series' observations starting at `start`.
pub fn series_url(base: &Url, series: &str, start: NaiveDate) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("id", series)
        .append_pair("cosd", &start.format("%Y-%m-%d").to_string());
    url
}

/// Fetch each series and outer-join them on date.
///
/// The resulting table has a `date` column followed by one column per
/// series id, in request order. Missing observations are empty cells.
pub async fn read<F: Fetch>(fetcher: &F, src: &SeriesFeedSource) -> Result<RawTable> {
    let mut fetched = Vec::with_capacity(src.series.len());
    for id in &src.series {
        let url = series_url(&src.base_url, id, src.start);
        let text = fetcher.get_text(&url).await?;
        let points = parse_series(url.as_str(), &text)?;
        info!(series = %id, points = points.len(), "fetched series");
        fetched.push((id.clone(), points));
    }
    Ok(join_series(
        &format!("{}[{}]", src.base_url, src.series.join(",")),
        src.start,
        fetched,
    ))
}

/// Parse a two-column `date,value` response. `.` marks a missing value.
pub fn parse_series(source_id: &str, text: &str) -> Result<Vec<(NaiveDate, Option<String>)>> {
    let (headers, rows) = parse_delimited(source_id, text, b',')?;
    if headers.len() < 2 {
        return Err(IngestError::format(
            source_id,
            format!("expected date and value columns, got {:?}", headers),
        ));
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let raw_date = row.first().map(String::as_str).unwrap_or("");
            let date = parse_date(raw_date).ok_or_else(|| {
                IngestError::format(source_id, format!("bad date `{}` at row {}", raw_date, i))
            })?;
            let value = row
                .get(1)
                .filter(|v| !is_missing(v))
                .map(|v| v.trim().to_string());
            Ok((date, value))
        })
        .collect()
}

/// Outer-join series on date, dropping anything before `start`.
///
/// A feed whose history begins after `start` is not an error; the
/// shortfall is only logged.
pub fn join_series(
    source_id: &str,
    start: NaiveDate,
    series: Vec<(String, Vec<(NaiveDate, Option<String>)>)>,
) -> RawTable {
    let width = series.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();

    for (col, (id, points)) in series.iter().enumerate() {
        if let Some(first) = points.iter().map(|(d, _)| *d).filter(|d| *d >= start).min() {
            if first > start {
                debug!(series = %id, requested = %start, first = %first, "feed history shorter than requested");
            }
        }
        for (date, value) in points {
            if *date < start {
                continue;
            }
            let row = by_date
                .entry(*date)
                .or_insert_with(|| vec![String::new(); width]);
            if let Some(v) = value {
                row[col] = v.clone();
            }
        }
    }

    let mut headers = Vec::with_capacity(width + 1);
    headers.push("date".to_string());
    headers.extend(series.iter().map(|(id, _)| id.clone()));

    let rows = by_date
        .into_iter()
        .map(|(date, values)| {
            let mut row = Vec::with_capacity(width + 1);
            row.push(date.format("%Y-%m-%d").to_string());
            row.extend(values);
            row
        })
        .collect();

    RawTable::new(source_id, headers, rows)
}
