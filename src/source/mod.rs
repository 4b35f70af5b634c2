// src/source/mod.rs

pub mod delimited;
pub mod feed;
pub mod html;
pub mod infer;

use chrono::NaiveDate;
use std::{fmt, path::PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
pub use infer::Column;

/// Untyped matrix as read from one source.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Identifies the source in logs and errors.
    pub source_id: String,
    /// Column names exactly as the source spelled them.
    pub headers: Vec<String>,
    /// Data rows, one String per cell.
    pub rows: Vec<Vec<String>>,
    /// Best-effort inferred typing, one entry per header.
    pub inferred: Vec<Column>,
}

impl RawTable {
    pub fn new(source_id: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let source_id = source_id.into();
        let inferred = infer::infer_columns(&source_id, &headers, &rows);
        Self {
            source_id,
            headers,
            rows,
            inferred,
        }
    }
}

/// Where a delimited file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    Url(Url),
}

impl Location {
    /// `http(s)://` strings are URLs, anything else is a filesystem path.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            Url::parse(s)
                .map(Location::Url)
                .map_err(|e| IngestError::Config(format!("invalid URL `{}`: {}", s, e)))
        } else {
            Ok(Location::Path(PathBuf::from(s)))
        }
    }

    pub async fn read_text<F: Fetch>(&self, fetcher: &F) -> Result<String> {
        match self {
            Location::Url(url) => fetcher.get_text(url).await,
            Location::Path(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| IngestError::unavailable(path.display().to_string(), e)),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Url(u) => write!(f, "{}", u),
        }
    }
}

/// One or more delimited files sharing a header; rows are concatenated in order.
#[derive(Debug, Clone)]
pub struct DelimitedSource {
    pub locations: Vec<Location>,
    pub delimiter: u8,
}

/// A table embedded in a hypertext document.
#[derive(Debug, Clone)]
pub struct HtmlTableSource {
    pub url: Url,
    /// CSS selector for candidate tables.
    pub selector: String,
    /// Header names a candidate must contain to be selected.
    pub signature: Vec<String>,
}

/// Keyed time-series feed queried per series identifier.
#[derive(Debug, Clone)]
pub struct SeriesFeedSource {
    pub base_url: Url,
    pub series: Vec<String>,
    pub start: NaiveDate,
}

#[derive(Debug, Clone)]
pub enum SourceSpec {
    Delimited(DelimitedSource),
    HtmlTable(HtmlTableSource),
    SeriesFeed(SeriesFeedSource),
}

impl SourceSpec {
    pub fn id(&self) -> String {
        match self {
            SourceSpec::Delimited(d) => d
                .locations
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(","),
            SourceSpec::HtmlTable(h) => h.url.to_string(),
            SourceSpec::SeriesFeed(s) => format!("{}[{}]", s.base_url, s.series.join(",")),
        }
    }

    /// Local files this source needs that are not on disk.
    pub fn missing_local_files(&self) -> Vec<PathBuf> {
        match self {
            SourceSpec::Delimited(d) => d
                .locations
                .iter()
                .filter_map(|l| match l {
                    Location::Path(p) if !p.is_file() => Some(p.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Read one source into a `RawTable`.
///
/// Fails with `SourceEmpty` when the source parses but has no data rows.
#[instrument(level = "info", skip(fetcher, spec), fields(source = %spec.id()))]
pub async fn read_source<F: Fetch>(fetcher: &F, spec: &SourceSpec) -> Result<RawTable> {
    let id = spec.id();
    let raw = match spec {
        SourceSpec::Delimited(src) => delimited::read(fetcher, src).await?,
        SourceSpec::HtmlTable(src) => html::read(fetcher, src).await?,
        SourceSpec::SeriesFeed(src) => feed::read(fetcher, src).await?,
    };
    if raw.rows.is_empty() {
        return Err(IngestError::SourceEmpty { source_id: id });
    }
    info!(
        rows = raw.rows.len(),
        columns = raw.headers.len(),
        "read source"
    );
    for col in &raw.inferred {
        debug!(column = %col.name, ty = ?col.ty, "inferred column type");
    }
    Ok(raw)
}
