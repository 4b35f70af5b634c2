// src/source/html.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use super::{HtmlTableSource, RawTable};
use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use crate::schema::normalize::normalize_header;

/// Citation markers such as `[3]` or `[note 1]` that wiki tables append to cells.
static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]{1,12}\]").unwrap());

/// One `<table>` pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub async fn read<F: Fetch>(fetcher: &F, src: &HtmlTableSource) -> Result<RawTable> {
    let source_id = src.url.to_string();
    let body = fetcher.get_text(&src.url).await?;
    let tables = parse_tables(&source_id, &body, &src.selector)?;
    debug!(source = %source_id, candidates = tables.len(), "parsed tables");
    let table = select_table(&source_id, tables, &src.signature)?;
    Ok(RawTable::new(source_id, table.headers, table.rows))
}

/// Extract every table matching `selector`.
///
/// The first row made only of `th` cells is the header; rows holding any
/// `td` cell are data. Tables without a header row are skipped.
pub fn parse_tables(source_id: &str, body: &str, selector: &str) -> Result<Vec<HtmlTable>> {
    let table_sel = Selector::parse(selector)
        .map_err(|e| IngestError::Config(format!("invalid table selector `{}`: {:?}", selector, e)))?;
    let row_sel = Selector::parse("tr").expect("CSS selector for rows should be valid");
    let cell_sel = Selector::parse("th, td").expect("CSS selector for cells should be valid");

    let doc = Html::parse_document(body);
    let mut tables = Vec::new();

    for (t_idx, table) in doc.select(&table_sel).enumerate() {
        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for tr in table.select(&row_sel) {
            let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
            if cells.is_empty() {
                continue;
            }
            let all_th = cells.iter().all(|c| c.value().name() == "th");
            let texts: Vec<String> = cells.iter().map(cell_text).collect();
            match (&headers, all_th) {
                (None, true) => headers = Some(texts),
                (Some(_), true) => trace!(source = source_id, table = t_idx, "extra header row"),
                (_, false) => rows.push(texts),
            }
        }

        match headers {
            Some(headers) => tables.push(HtmlTable { headers, rows }),
            None => trace!(source = source_id, table = t_idx, "table without header row"),
        }
    }

    if tables.is_empty() {
        return Err(IngestError::format(source_id, "document contains no tables"));
    }
    Ok(tables)
}

/// Pick the single table whose headers contain every `signature` name.
pub fn select_table(
    source_id: &str,
    tables: Vec<HtmlTable>,
    signature: &[String],
) -> Result<HtmlTable> {
    let wanted: Vec<String> = signature.iter().map(|s| normalize_header(s)).collect();
    let mut matching: Vec<HtmlTable> = tables
        .into_iter()
        .filter(|t| {
            let have: Vec<String> = t.headers.iter().map(|h| normalize_header(h)).collect();
            wanted.iter().all(|w| have.contains(w))
        })
        .collect();

    if matching.len() != 1 {
        return Err(IngestError::AmbiguousSource {
            source_id: source_id.to_string(),
            matches: matching.len(),
        });
    }
    Ok(matching.remove(0))
}

fn cell_text(cell: &ElementRef) -> String {
    let joined: String = cell.text().collect();
    let stripped = CITATION.replace_all(&joined, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PAGE: &str = r#"
<html><body>
<table class="wikitable" id="constituents">
<thead>
<tr><th>Symbol</th><th>Security</th><th>SEC filings</th><th>GICS Sector</th><th>GICS Sub-Industry</th><th>Headquarters Location</th><th>Date first added</th><th>CIK</th><th>Founded</th></tr>
</thead>
<tbody>
<tr><td><a href="/mmm">MMM</a></td><td><a>3M Company</a></td><td><a>reports</a></td><td>Industrials</td><td>Industrial Conglomerates</td><td>St. Paul,
 Minnesota</td><td>1976-08-09</td><td>0000066740</td><td>1902</td></tr>
<tr><td>ABT</td><td>Abbott Laboratories</td><td>reports</td><td>Health Care</td><td>Health Care Equipment</td><td>North Chicago, Illinois</td><td>1964-03-31</td><td>0000001800</td><td>1888<sup>[4]</sup></td></tr>
</tbody>
</table>
<table class="wikitable" id="changes">
<tr><th>Date</th><th>Added</th><th>Removed</th><th>Reason</th></tr>
<tr><td>2019-01-18</td><td>TFX</td><td>SCG</td><td>Market cap change</td></tr>
</table>
</body></html>"#;

    fn signature() -> Vec<String> {
        vec!["Symbol".into(), "Security".into(), "GICS Sector".into()]
    }

    #[test]
    fn extracts_headers_rows_and_clean_text() {
        let tables = parse_tables("sp500", PAGE, "table").unwrap();
        assert_eq!(tables.len(), 2);
        let t = &tables[0];
        assert_eq!(t.headers.len(), 9);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0][0], "MMM");
        assert_eq!(t.rows[0][5], "St. Paul, Minnesota");
        assert_eq!(t.rows[1][8], "1888");
    }

    #[test]
    fn selects_by_signature() {
        let tables = parse_tables("sp500", PAGE, "table").unwrap();
        let t = select_table("sp500", tables, &signature()).unwrap();
        assert_eq!(t.headers[0], "Symbol");
    }

    #[test]
    fn no_match_or_many_matches_is_ambiguous() {
        let tables = parse_tables("sp500", PAGE, "table").unwrap();
        let err = select_table("sp500", tables.clone(), &["Ticker".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousSource);

        let mut doubled = tables.clone();
        doubled.push(tables[0].clone());
        let err = select_table("sp500", doubled, &signature()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::AmbiguousSource { matches: 2, .. }
        ));
    }

    #[test]
    fn page_without_tables_is_format_error() {
        let err = parse_tables("x", "<html><p>moved</p></html>", "table").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceFormatError);
    }

    #[test]
    fn custom_selector_narrows_candidates() {
        let tables = parse_tables("sp500", PAGE, "table#changes").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers[0], "Date");
    }
}
