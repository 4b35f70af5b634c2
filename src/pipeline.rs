// src/pipeline.rs

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{Advisory, ErrorKind, IngestError, Result};
use crate::families;
use crate::fetch::Fetch;
use crate::schema::{normalize, Family};
use crate::source::read_source;
use crate::store::TableStore;

/// Result of running one family's chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded {
        key: String,
        rows: usize,
        excluded_rows: usize,
        advisories: Vec<Advisory>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyOutcome {
    pub family: Family,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub families: Vec<FamilyOutcome>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, family: Family, outcome: Outcome) {
        match &outcome {
            Outcome::Succeeded { .. } => self.succeeded += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
        self.families.push(FamilyOutcome { family, outcome });
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn outcome(&self, family: Family) -> Option<&Outcome> {
        self.families
            .iter()
            .find(|f| f.family == family)
            .map(|f| &f.outcome)
    }
}

/// Runs each family's read → normalize → transform → write chain.
///
/// Families run one after another; a failing family is recorded and the
/// next one still runs.
pub struct Pipeline<'a, F, S> {
    config: &'a Config,
    fetcher: F,
    store: S,
}

impl<'a, F: Fetch, S: TableStore> Pipeline<'a, F, S> {
    pub fn new(config: &'a Config, fetcher: F, store: S) -> Self {
        Self {
            config,
            fetcher,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the selected families (all of them when `only` is empty).
    pub async fn run(&self, only: &[Family]) -> RunSummary {
        let mut summary = RunSummary::default();
        for family in Family::ALL {
            let outcome = if !only.is_empty() && !only.contains(&family) {
                Outcome::Skipped {
                    reason: "not selected".into(),
                }
            } else {
                self.run_family(family).await
            };
            summary.record(family, outcome);
        }
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );
        summary
    }

    #[instrument(level = "info", skip(self), fields(key = family.key()))]
    pub async fn run_family(&self, family: Family) -> Outcome {
        if !self.config.is_enabled(family) {
            info!("disabled in configuration");
            return Outcome::Skipped {
                reason: "disabled in configuration".into(),
            };
        }

        match self.ingest(family).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(kind = %err.kind(), error = %err, "family failed");
                Outcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    async fn ingest(&self, family: Family) -> Result<Outcome> {
        let spec = self.config.source(family)?;

        let missing = spec.missing_local_files();
        if !missing.is_empty() {
            let files: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            warn!(files = ?files, "required local files absent");
            return Ok(Outcome::Skipped {
                reason: format!("missing local file(s): {}", files.join(", ")),
            });
        }

        let schema = families::schema(family, self.config);
        let raw = read_source(&self.fetcher, &spec).await?;
        let normalized = normalize(raw, &schema)?;
        let transformed = families::transform(&schema, normalized)?;
        if transformed.table.num_rows() == 0 {
            return Err(IngestError::SourceEmpty {
                source_id: spec.id(),
            });
        }

        let report = self.store.put(family.key(), &transformed.table)?;
        info!(
            rows = report.rows,
            excluded = transformed.excluded,
            advisories = report.advisories.len(),
            "family written"
        );
        Ok(Outcome::Succeeded {
            key: report.key,
            rows: report.rows,
            excluded_rows: transformed.excluded,
            advisories: report.advisories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelimitedConfig;
    use crate::fetch::stub::StaticFetcher;
    use crate::source::feed::series_url;
    use crate::store::ParquetStore;
    use std::{fs, path::Path};
    use tempfile::{tempdir, TempDir};
    use tracing_subscriber::EnvFilter;
    use url::Url;

    const FEED: &str = "http://feed.test/graph/fredgraph.csv";
    const LIST: &str = "http://list.test/wiki/List_of_S%26P_500_companies";

    const PRICES: &str = "ticker,date,open,high,low,close,volume,ex-dividend,split_ratio,adj_open,adj_high,adj_low,adj_close,adj_volume
A,1999-11-18,45.5,50.0,40.0,44.0,44739900.0,0.0,1.0,31.04,34.11,27.29,30.02,44739900.0
A,1999-11-19,42.94,43.0,39.81,40.38,10897100.0,0.0,1.0,29.30,29.34,27.16,27.55,10897100.0
AA,1999-11-18,,,,,,,,,,,,
";

    const PAGE: &str = r#"<html><body><table class="wikitable">
<tr><th>Symbol</th><th>Security</th><th>SEC filings</th><th>GICS Sector</th><th>GICS Sub-Industry</th><th>Headquarters Location</th><th>Date first added</th><th>CIK</th><th>Founded</th></tr>
<tr><td>MMM</td><td>3M Company</td><td>reports</td><td>Industrials</td><td>Industrial Conglomerates</td><td>St. Paul, Minnesota</td><td>1976-08-09</td><td>0000066740</td><td>1902</td></tr>
</table></body></html>"#;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    }

    fn write(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    /// Config pointing at local scratch files and stubbed endpoints.
    fn setup(data: &TempDir, store: &TempDir) -> (Config, StaticFetcher) {
        init_tracing();
        let mut cfg = Config::default();
        cfg.store = store.path().to_path_buf();
        let f = &mut cfg.families;

        f.wiki_prices.locations = vec![write(data.path(), "wiki_prices.csv", PRICES)];
        f.wiki_stocks.locations = vec![write(
            data.path(),
            "wiki_stocks.csv",
            "code,name\nA,Agilent Technologies (A) Prices\nAA,Alcoa (AA)\n",
        )];
        f.equities = DelimitedConfig {
            enabled: true,
            locations: vec![data.path().join("nasdaq.csv").display().to_string()],
            delimiter: ',',
        };
        f.index_prices.base_url = FEED.into();
        f.macro_assets.base_url = FEED.into();
        f.index_stocks.url = LIST.into();

        let base = Url::parse(FEED).unwrap();
        let mut fetcher = StaticFetcher::new().with(
            &series_url(&base, "SP500", f.index_prices.start),
            "DATE,SP500\n2009-01-02,931.80\n2009-01-05,927.45\n2009-01-06,.\n",
        );
        for s in &f.macro_assets.series {
            fetcher = fetcher.with(
                &series_url(&base, &s.id, f.macro_assets.start),
                &format!("DATE,{}\n2020-01-02,1.5\n2020-01-04,2.5\n", s.id),
            );
        }
        (cfg, fetcher)
    }

    #[tokio::test]
    async fn unreachable_source_does_not_stop_other_families() {
        let (data, root) = (tempdir().unwrap(), tempdir().unwrap());
        let (cfg, fetcher) = setup(&data, &root);
        let pipeline = Pipeline::new(&cfg, fetcher, ParquetStore::open(root.path()).unwrap());

        let summary = pipeline.run(&[]).await;

        assert!(matches!(
            summary.outcome(Family::IndexStocks),
            Some(Outcome::Failed { kind: ErrorKind::SourceUnavailable, .. })
        ));
        assert!(matches!(
            summary.outcome(Family::Equities),
            Some(Outcome::Skipped { .. })
        ));
        assert!(matches!(
            summary.outcome(Family::WikiPrices),
            Some(Outcome::Succeeded { rows: 3, .. })
        ));
        assert_eq!((summary.succeeded, summary.skipped, summary.failed), (4, 1, 1));
        assert!(summary.has_failures());

        let store = pipeline.store();
        assert_eq!(store.get("wiki/prices").unwrap().num_rows(), 3);
        assert_eq!(store.get("index/prices").unwrap().num_rows(), 2);
        let macro_assets = store.get("macro/assets").unwrap();
        // Saturday observations fold into Friday
        assert_eq!(macro_assets.num_rows(), 2);
        assert_eq!(macro_assets.column_names().len(), 6);
        assert!(!store.contains("index/stocks").unwrap());
    }

    #[tokio::test]
    async fn rerun_on_unchanged_sources_is_byte_identical() {
        let (data, root) = (tempdir().unwrap(), tempdir().unwrap());
        let (cfg, fetcher) = setup(&data, &root);
        let fetcher = fetcher.with(&Url::parse(LIST).unwrap(), PAGE);
        let pipeline = Pipeline::new(&cfg, fetcher, ParquetStore::open(root.path()).unwrap());

        let first = pipeline.run(&[]).await;
        assert!(!first.has_failures());
        let keys = pipeline.store().keys().unwrap();
        assert_eq!(keys.len(), 5);
        let before: Vec<Vec<u8>> = keys
            .iter()
            .map(|k| fs::read(pipeline.store().path_of(k).unwrap()).unwrap())
            .collect();

        let second = pipeline.run(&[]).await;
        assert_eq!(first, second);
        let after: Vec<Vec<u8>> = keys
            .iter()
            .map(|k| fs::read(pipeline.store().path_of(k).unwrap()).unwrap())
            .collect();
        assert_eq!(before, after);

        match second.outcome(Family::IndexStocks) {
            Some(Outcome::Succeeded { advisories, .. }) => assert_eq!(advisories.len(), 1),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_family_keeps_previous_table() {
        let (data, root) = (tempdir().unwrap(), tempdir().unwrap());
        let (cfg, fetcher) = setup(&data, &root);
        let pipeline = Pipeline::new(&cfg, fetcher, ParquetStore::open(root.path()).unwrap());
        pipeline.run(&[Family::WikiStocks]).await;
        let path = pipeline.store().path_of("wiki/stocks").unwrap();
        let committed = fs::read(&path).unwrap();

        // header no longer carries the name column
        fs::write(data.path().join("wiki_stocks.csv"), "code\nA\n").unwrap();
        let summary = pipeline.run(&[Family::WikiStocks]).await;
        assert!(matches!(
            summary.outcome(Family::WikiStocks),
            Some(Outcome::Failed { kind: ErrorKind::SchemaMismatch, .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), committed);
    }

    #[tokio::test]
    async fn disabled_and_unselected_families_are_skipped() {
        let (data, root) = (tempdir().unwrap(), tempdir().unwrap());
        let (mut cfg, fetcher) = setup(&data, &root);
        cfg.families.wiki_prices.enabled = false;
        let pipeline = Pipeline::new(&cfg, fetcher, ParquetStore::open(root.path()).unwrap());

        let summary = pipeline.run(&[Family::WikiPrices, Family::IndexPrices]).await;
        assert_eq!((summary.succeeded, summary.skipped, summary.failed), (1, 5, 0));
        assert_eq!(pipeline.store().keys().unwrap(), vec!["index/prices"]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["families"][0]["family"], "wiki_prices");
        assert_eq!(json["families"][0]["status"], "skipped");
        assert_eq!(json["families"][2]["status"], "succeeded");
        assert_eq!(json["families"][2]["key"], "index/prices");
    }
}
