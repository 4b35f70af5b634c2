use anyhow::{Context, Result};
use clap::Parser;
use refdata::{
    config::Config,
    fetch::HttpFetcher,
    pipeline::{Outcome, Pipeline},
    schema::Family,
    store::ParquetStore,
};
use std::{fs, path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Fetch reference data sources, normalize them and write them to the store.
#[derive(Parser, Debug)]
struct Args {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store root directory (overrides the configuration)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Only run these families, by name or store key (repeatable)
    #[arg(long)]
    only: Vec<Family>,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,refdata=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    // ─── 2) configuration ────────────────────────────────────────────
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(store) = args.store {
        config.store = store;
    }
    info!(store = %config.store.display(), "startup");

    // ─── 3) run ──────────────────────────────────────────────────────
    let fetcher = HttpFetcher::new(&config.http).context("building HTTP client")?;
    let store = ParquetStore::open(config.store.clone())
        .with_context(|| format!("opening store at `{}`", config.store.display()))?;
    let summary = Pipeline::new(&config, fetcher, store).run(&args.only).await;

    // ─── 4) report ───────────────────────────────────────────────────
    for f in &summary.families {
        match &f.outcome {
            Outcome::Succeeded {
                key,
                rows,
                excluded_rows,
                advisories,
            } => {
                info!(family = %f.family, %key, rows, excluded_rows, "succeeded");
                for a in advisories {
                    warn!(family = %f.family, "{}", a);
                }
            }
            Outcome::Skipped { reason } => info!(family = %f.family, %reason, "skipped"),
            Outcome::Failed { kind, message } => {
                error!(family = %f.family, %kind, %message, "failed")
            }
        }
    }

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        fs::write(path, json)
            .with_context(|| format!("writing summary to `{}`", path.display()))?;
        info!(path = %path.display(), "summary written");
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
