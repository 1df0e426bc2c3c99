//! HTTP client for the companion transaction store
//!
//! The backend exposes two endpoints: a per-asset fetch and a bulk upsert.
//! Both wrap their payloads in a `{success, data}` envelope. Transport and
//! envelope failures propagate to the caller unchanged: nothing is retried
//! or cached here; the sync loop simply runs another pass.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::types::Transaction;

#[derive(Debug, Deserialize)]
struct FetchEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Vec<Transaction>>,
}

#[derive(Debug, Serialize)]
struct PushBody<'a> {
    transactions: &'a [Transaction],
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    success: bool,
}

/// Client for the transaction persistence service.
pub struct BackendStore {
    base_url: String,
    http: reqwest::Client,
}

impl BackendStore {
    /// Create a store client. `base_url` must not have a trailing slash.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(BackendStore {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Fetch every stored transaction for one asset, any state.
    pub async fn fetch_by_asset(&self, asset_id: u64) -> Result<Vec<Transaction>> {
        let url = format!("{}/transactions/{}/all", self.base_url, asset_id);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;

        let envelope: FetchEnvelope = response
            .json()
            .await
            .with_context(|| format!("GET {} returned an invalid envelope", url))?;

        if !envelope.success {
            bail!("Backend reported failure fetching transactions for asset {}", asset_id);
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// Bulk-upsert reconciled transactions. Returns the number pushed.
    pub async fn push(&self, transactions: &[Transaction]) -> Result<usize> {
        if transactions.is_empty() {
            return Ok(0);
        }
        let url = format!("{}/transactions", self.base_url);
        debug!("POST {} ({} row(s))", url, transactions.len());
        let response = self
            .http
            .post(&url)
            .json(&PushBody { transactions })
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?
            .error_for_status()
            .with_context(|| format!("POST {} returned an error status", url))?;

        let envelope: PushEnvelope = response
            .json()
            .await
            .with_context(|| format!("POST {} returned an invalid envelope", url))?;

        if !envelope.success {
            bail!("Backend reported failure storing {} transaction(s)", transactions.len());
        }
        Ok(transactions.len())
    }
}
