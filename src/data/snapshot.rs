//! Options snapshot fetcher
//!
//! Drains the paginated `/v3/snapshot/options/{underlying}` endpoint into
//! one flat list of contract records. Each page carries a batch of results
//! and an optional `next_url`; the credential is attached to every request
//! because `next_url` does not carry it.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::thread;
use std::time::Duration;

use crate::core::{ContractType, MatrixError, MatrixResult, OptionContract};

/// Opaque API credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank input
    pub fn new(key: impl Into<String>) -> MatrixResult<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(MatrixError::invalid_input("API key is empty"));
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// API root, no trailing slash
    pub base_url: String,
    /// Credential sent as the `apiKey` query parameter
    pub api_key: ApiKey,
    /// Results per page requested from the API
    pub page_limit: u32,
    /// Retries on HTTP 429 before giving up
    pub max_retries: u32,
    /// First backoff delay, doubled on each retry
    pub retry_backoff_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl FetchConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            base_url: "https://api.polygon.io".to_string(),
            api_key,
            page_limit: 250,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            timeout_secs: 30,
        }
    }

    /// First page URL for a symbol
    pub fn snapshot_url(&self, symbol: &str) -> String {
        format!(
            "{}/v3/snapshot/options/{}?limit={}",
            self.base_url.trim_end_matches('/'),
            symbol,
            self.page_limit
        )
    }
}

/// Anything that can produce the full record list for a symbol
pub trait ChainSource {
    fn fetch_chain(&self, symbol: &str) -> MatrixResult<Vec<OptionContract>>;
}

/// One decoded page
#[derive(Debug, Clone, Default)]
pub struct SnapshotPage {
    pub records: Vec<OptionContract>,
    pub next_url: Option<String>,
}

/// Follow `next_url` from `first_url` until the API stops returning one,
/// concatenating records in page order.
pub fn drain_pages<F>(first_url: String, mut fetch_page: F) -> MatrixResult<Vec<OptionContract>>
where
    F: FnMut(&str) -> MatrixResult<SnapshotPage>,
{
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(first_url);
    let mut pages = 0usize;

    while let Some(url) = next.take() {
        if !seen.insert(url.clone()) {
            return Err(MatrixError::upstream(format!(
                "pagination loop: {} returned twice",
                url
            )));
        }

        let page = fetch_page(&url)?;
        pages += 1;
        tracing::debug!("Page {}: {} records", pages, page.records.len());

        records.extend(page.records);
        next = page.next_url.filter(|u| !u.trim().is_empty());
    }

    tracing::info!("Drained {} pages, {} records", pages, records.len());
    Ok(records)
}

/// Blocking client for the snapshot endpoint
pub struct SnapshotClient {
    client: reqwest::blocking::Client,
    config: FetchConfig,
}

impl SnapshotClient {
    pub fn new(config: FetchConfig) -> MatrixResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("volmatrix/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MatrixError::upstream(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch and decode one page, retrying rate-limited responses
    pub fn fetch_page(&self, url: &str) -> MatrixResult<SnapshotPage> {
        let mut attempt = 0u32;

        loop {
            let response = self
                .client
                .get(url)
                .query(&[("apiKey", self.config.api_key.expose())])
                .send()
                .map_err(|e| MatrixError::upstream(e.without_url().to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < self.config.max_retries {
                let delay = backoff_delay_ms(self.config.retry_backoff_ms, attempt);
                attempt += 1;
                tracing::warn!(
                    "Rate limited, retry {}/{} in {} ms",
                    attempt,
                    self.config.max_retries,
                    delay
                );
                thread::sleep(Duration::from_millis(delay));
                continue;
            }

            if !status.is_success() {
                return Err(MatrixError::upstream(format!("HTTP {}", status)));
            }

            let body: SnapshotResponse = response
                .json()
                .map_err(|e| MatrixError::upstream(format!("Failed to parse snapshot: {}", e)))?;

            return body.into_page();
        }
    }
}

/// Exponential backoff, saturating instead of overflowing for large attempts
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

impl ChainSource for SnapshotClient {
    fn fetch_chain(&self, symbol: &str) -> MatrixResult<Vec<OptionContract>> {
        let symbol = normalize_symbol(symbol)?;
        tracing::info!("Fetching option snapshot for {}", symbol);
        drain_pages(self.config.snapshot_url(&symbol), |url| self.fetch_page(url))
    }
}

/// Trimmed, upper-cased ticker; blank is an error
pub fn normalize_symbol(symbol: &str) -> MatrixResult<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(MatrixError::invalid_input("Enter a ticker symbol"));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == ':')
    {
        return Err(MatrixError::invalid_input(format!(
            "Invalid ticker symbol '{}'",
            symbol
        )));
    }
    Ok(symbol)
}

// Snapshot API response structures

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Vec<SnapshotResult>,
    #[serde(default)]
    next_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResult {
    #[serde(default)]
    details: Option<SnapshotDetails>,
    #[serde(default)]
    implied_volatility: Option<f64>,
    #[serde(default)]
    underlying_asset: Option<SnapshotUnderlying>,
}

#[derive(Debug, Deserialize)]
struct SnapshotDetails {
    #[serde(default)]
    contract_type: Option<String>,
    #[serde(default)]
    strike_price: Option<f64>,
    #[serde(default)]
    expiration_date: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotUnderlying {
    #[serde(default)]
    price: Option<f64>,
}

impl SnapshotResponse {
    fn into_page(self) -> MatrixResult<SnapshotPage> {
        if let Some(status) = self.status.as_deref() {
            if status.eq_ignore_ascii_case("ERROR") || status.eq_ignore_ascii_case("NOT_AUTHORIZED")
            {
                let detail = self.error.or(self.message).unwrap_or_else(|| status.to_string());
                return Err(MatrixError::upstream(detail));
            }
        }

        let total = self.results.len();
        let records: Vec<OptionContract> =
            self.results.into_iter().filter_map(convert_result).collect();

        if records.len() < total {
            tracing::warn!(
                "Dropped {} snapshot results without a contract type",
                total - records.len()
            );
        }

        Ok(SnapshotPage {
            records,
            next_url: self.next_url,
        })
    }
}

/// Map an API result to a record; results without a known side are dropped
fn convert_result(result: SnapshotResult) -> Option<OptionContract> {
    let details = result.details?;
    let contract_type: ContractType = details.contract_type?.parse().ok()?;

    Some(OptionContract {
        contract_type,
        strike_price: details.strike_price,
        expiration_date: details.expiration_date,
        implied_volatility: result.implied_volatility,
        underlying_price: result.underlying_asset.and_then(|u| u.price),
        ticker: details.ticker,
    })
}
