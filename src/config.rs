// src/config.rs

use anyhow::{bail, ensure, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path, path::PathBuf};
use url::Url;

use crate::error::IngestError;
use crate::schema::Family;
use crate::source::{DelimitedSource, HtmlTableSource, Location, SeriesFeedSource, SourceSpec};

const FRED_GRAPH_CSV: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";
const SP500_CONSTITUENTS: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";
const MAX_RETRIES: u32 = 10;

/// Everything a pipeline run needs. Passed explicitly; nothing is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory of the Parquet store.
    pub store: PathBuf,
    pub http: HttpConfig,
    pub families: FamiliesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Retries after the first failed request, so total attempts is one more.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub user_agent: String,
}

/// Per-family source configuration. Omitted sections keep their defaults;
/// a section that is present replaces the default section entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamiliesConfig {
    pub wiki_prices: DelimitedConfig,
    pub wiki_stocks: DelimitedConfig,
    pub index_prices: FeedConfig,
    pub index_stocks: HtmlConfig,
    pub equities: DelimitedConfig,
    pub macro_assets: FeedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelimitedConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Local paths or http(s) URLs, concatenated in this order.
    pub locations: Vec<String>,
    #[serde(default = "comma")]
    pub delimiter: char,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub url: String,
    #[serde(default = "table_selector")]
    pub selector: String,
    /// Headers the wanted table must carry.
    pub signature: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "fred_base")]
    pub base_url: String,
    pub start: NaiveDate,
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    /// Identifier the feed is queried with.
    pub id: String,
    /// Column name in the stored table; defaults to the id.
    #[serde(default)]
    pub label: Option<String>,
}

impl SeriesConfig {
    fn new(id: &str, label: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            label: label.map(str::to_string),
        }
    }

    pub fn column(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

fn enabled() -> bool {
    true
}

fn comma() -> char {
    ','
}

fn table_selector() -> String {
    "table".to_string()
}

fn fred_base() -> String {
    FRED_GRAPH_CSV.to_string()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: PathBuf::from("store"),
            http: HttpConfig::default(),
            families: FamiliesConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
            user_agent: format!("refdata/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for FamiliesConfig {
    fn default() -> Self {
        let local = |paths: &[&str]| DelimitedConfig {
            enabled: true,
            locations: paths.iter().map(|p| p.to_string()).collect(),
            delimiter: ',',
        };
        Self {
            wiki_prices: local(&["data/wiki_prices.csv"]),
            wiki_stocks: local(&["data/wiki_stocks.csv"]),
            index_prices: FeedConfig {
                enabled: true,
                base_url: fred_base(),
                start: ymd(2009, 1, 1),
                series: vec![SeriesConfig::new("SP500", Some("level"))],
            },
            index_stocks: HtmlConfig {
                enabled: true,
                url: SP500_CONSTITUENTS.to_string(),
                selector: table_selector(),
                signature: vec!["Symbol".into(), "Security".into(), "GICS Sector".into()],
            },
            equities: local(&["data/nasdaq.csv", "data/amex.csv", "data/nyse.csv"]),
            macro_assets: FeedConfig {
                enabled: true,
                base_url: fred_base(),
                start: ymd(2000, 1, 1),
                series: vec![
                    SeriesConfig::new("BAMLCC0A0CMTRIV", Some("US Corp Master TRI")),
                    SeriesConfig::new("BAMLHYH0A0HYM2TRIV", Some("US High Yield TRI")),
                    SeriesConfig::new(
                        "BAMLEMCBPITRIV",
                        Some("Emerging Markets Corporate Plus TRI"),
                    ),
                    SeriesConfig::new("GOLDAMGBD228NLBM", Some("Gold (London, USD)")),
                    SeriesConfig::new("DGS10", Some("10-Year Treasury CMR")),
                ],
            },
        }
    }
}

impl Config {
    /// Load from a YAML file, or the built-in defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config `{}`", p.display()))?;
                serde_yaml::from_str::<Config>(&text)
                    .with_context(|| format!("parsing config `{}`", p.display()))?
            }
            None => Config::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.store.as_os_str().is_empty(),
            "store root must not be empty"
        );
        ensure!(self.http.timeout_secs > 0, "http.timeout_secs must be positive");
        ensure!(
            self.http.max_retries <= MAX_RETRIES,
            "http.max_retries must be at most {}, got {}",
            MAX_RETRIES,
            self.http.max_retries
        );

        for family in Family::ALL {
            if !self.is_enabled(family) {
                continue;
            }
            self.source(family)
                .with_context(|| format!("families.{}", family))?;
        }

        let index = &self.families.index_prices;
        if index.enabled {
            ensure!(
                index.series.len() == 1,
                "families.index_prices needs exactly one series, got {}",
                index.series.len()
            );
        }

        let mut seen = HashSet::new();
        for s in &self.families.macro_assets.series {
            if !seen.insert(s.column()) {
                bail!("families.macro_assets: duplicate column `{}`", s.column());
            }
            ensure!(
                s.column() != "date",
                "families.macro_assets: `date` is reserved"
            );
        }
        Ok(())
    }

    pub fn is_enabled(&self, family: Family) -> bool {
        let f = &self.families;
        match family {
            Family::WikiPrices => f.wiki_prices.enabled,
            Family::WikiStocks => f.wiki_stocks.enabled,
            Family::IndexPrices => f.index_prices.enabled,
            Family::IndexStocks => f.index_stocks.enabled,
            Family::Equities => f.equities.enabled,
            Family::MacroAssets => f.macro_assets.enabled,
        }
    }

    /// Source descriptor for `family`.
    pub fn source(&self, family: Family) -> crate::error::Result<SourceSpec> {
        let f = &self.families;
        match family {
            Family::WikiPrices => f.wiki_prices.source(),
            Family::WikiStocks => f.wiki_stocks.source(),
            Family::IndexPrices => f.index_prices.source(),
            Family::IndexStocks => f.index_stocks.source(),
            Family::Equities => f.equities.source(),
            Family::MacroAssets => f.macro_assets.source(),
        }
    }
}

impl DelimitedConfig {
    pub fn source(&self) -> crate::error::Result<SourceSpec> {
        if self.locations.is_empty() {
            return Err(IngestError::Config("no locations configured".into()));
        }
        if !self.delimiter.is_ascii() {
            return Err(IngestError::Config(format!(
                "delimiter `{}` is not a single byte",
                self.delimiter
            )));
        }
        let locations = self
            .locations
            .iter()
            .map(|l| Location::parse(l))
            .collect::<crate::error::Result<Vec<_>>>()?;
        Ok(SourceSpec::Delimited(DelimitedSource {
            locations,
            delimiter: self.delimiter as u8,
        }))
    }
}

impl HtmlConfig {
    pub fn source(&self) -> crate::error::Result<SourceSpec> {
        if self.signature.is_empty() {
            return Err(IngestError::Config("empty table signature".into()));
        }
        Ok(SourceSpec::HtmlTable(HtmlTableSource {
            url: parse_url(&self.url)?,
            selector: self.selector.clone(),
            signature: self.signature.clone(),
        }))
    }
}

impl FeedConfig {
    pub fn source(&self) -> crate::error::Result<SourceSpec> {
        if self.series.is_empty() {
            return Err(IngestError::Config("no series configured".into()));
        }
        Ok(SourceSpec::SeriesFeed(SeriesFeedSource {
            base_url: parse_url(&self.base_url)?,
            series: self.series.iter().map(|s| s.id.clone()).collect(),
            start: self.start,
        }))
    }
}

fn parse_url(s: &str) -> crate::error::Result<Url> {
    Url::parse(s).map_err(|e| IngestError::Config(format!("invalid URL `{}`: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::load(None).unwrap();
        assert_eq!(cfg.http.max_retries, 3);
        assert_eq!(cfg.families.macro_assets.series.len(), 5);
        assert_eq!(cfg.families.index_prices.series[0].column(), "level");
        assert!(Family::ALL.iter().all(|f| cfg.is_enabled(*f)));

        match cfg.source(Family::Equities).unwrap() {
            SourceSpec::Delimited(d) => assert_eq!(d.locations.len(), 3),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn yaml_overrides_only_what_it_names() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
store: /tmp/refdata-store
http:
  timeout_secs: 5
families:
  index_stocks:
    enabled: false
    url: https://example.com/list
    signature: [Symbol]
  macro_assets:
    start: 2015-06-01
    series:
      - id: DGS10
        label: 10Y
"#
        )
        .unwrap();
        let cfg = Config::load(Some(f.path())).unwrap();
        assert_eq!(cfg.store, PathBuf::from("/tmp/refdata-store"));
        assert_eq!(cfg.http.timeout_secs, 5);
        assert_eq!(cfg.http.max_retries, 3);
        assert!(!cfg.is_enabled(Family::IndexStocks));
        assert_eq!(cfg.families.macro_assets.base_url, FRED_GRAPH_CSV);
        assert_eq!(cfg.families.macro_assets.series[0].column(), "10Y");
        assert_eq!(
            cfg.families.wiki_prices.locations,
            vec!["data/wiki_prices.csv".to_string()]
        );
    }

    #[test]
    fn rejects_unknown_keys_and_bad_sections() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "stroe: x\n").unwrap();
        assert!(Config::load(Some(f.path())).is_err());

        let mut cfg = Config::default();
        cfg.families.macro_assets.series.push(SeriesConfig::new("DGS10", None));
        cfg.families.macro_assets.series.push(SeriesConfig::new("DGS10", None));
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.families.index_prices.series.push(SeriesConfig::new("NASDAQCOM", None));
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.families.wiki_stocks.locations.clear();
        assert!(cfg.validate().is_err());
        cfg.families.wiki_stocks.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn retry_count_is_bounded() {
        let mut cfg = Config::default();
        cfg.http.max_retries = MAX_RETRIES;
        assert!(cfg.validate().is_ok());
        cfg.http.max_retries = 40;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("http.max_retries"));
    }
}
