// src/fetch/mod.rs

use reqwest::Client;
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::{IngestError, Result};

/// Capability to retrieve the text body behind a URL.
///
/// The pipeline only ever talks to the network through this trait, so
/// tests can swap in canned responses.
pub trait Fetch: Send + Sync {
    fn get_text(&self, url: &Url) -> impl Future<Output = Result<String>> + Send;
}

/// reqwest-backed fetcher with a per-request timeout and bounded retry.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Config(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
        })
    }

    async fn get_text_core(&self, url: &Url) -> std::result::Result<String, Attempt> {
        debug!("Fetching text from {}", url);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Attempt::Retry(format!("GET {} failed: {}", url, e)))?;

        let status = resp.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retry(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(format!("{} returned {}", url, status)));
        }

        resp.text()
            .await
            .map_err(|e| Attempt::Retry(format!("reading body from {}: {}", url, e)))
    }
}

/// Outcome of one failed request: worth retrying or not.
enum Attempt {
    Retry(String),
    Fatal(String),
}

impl Fetch for HttpFetcher {
    fn get_text(&self, url: &Url) -> impl Future<Output = Result<String>> + Send {
        async move {
            let mut attempts = 0;
            loop {
                match self.get_text_core(url).await {
                    Ok(t) => return Ok(t),
                    Err(Attempt::Retry(reason)) if attempts < self.max_retries => {
                        attempts += 1;
                        let backoff = self.initial_backoff * 2u32.pow(attempts - 1);
                        warn!(%url, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %reason, "Retrying");
                        sleep(backoff).await;
                    }
                    Err(Attempt::Retry(reason)) => {
                        error!(%url, error = %reason, "Exhausted retries");
                        return Err(IngestError::unavailable(url.as_str(), reason));
                    }
                    Err(Attempt::Fatal(reason)) => {
                        return Err(IngestError::unavailable(url.as_str(), reason));
                    }
                }
            }
        }
    }
}
