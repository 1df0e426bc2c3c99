//! HTTP gateway to the chain-facing event and action service
//!
//! The gateway service watches the token contract and exposes its raw logs
//! at `/events`; participant actions go to `/actions` and come back with a
//! reference id once the external ledger accepts them. Acceptance is not
//! settlement: the effect shows up in a later reconcile pass.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use marketplace_sale_logic::chain::{ActionSubmitter, EventFilter, EventSource, SaleAction, SubmitReceipt};
use marketplace_sale_logic::events::RawSaleEvent;

#[derive(Debug, Deserialize)]
struct EventsEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Vec<RawSaleEvent>>,
}

#[derive(Debug, Deserialize)]
struct SubmitEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<SubmitReceipt>,
}

/// Gateway client implementing both collaborator seams.
pub struct HttpGateway {
    base_url: String,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl EventSource for HttpGateway {
    async fn get_raw_events(&self, filter: &EventFilter) -> Result<Vec<RawSaleEvent>> {
        let url = format!("{}/events", self.base_url);
        let mut request = self.http.get(&url);
        if let Some(asset_id) = filter.asset_id {
            request = request.query(&[("assetId", asset_id.to_string())]);
        }
        if let Some(participant) = &filter.participant {
            request = request.query(&[("participant", participant.clone())]);
        }
        debug!("GET {} ({:?})", url, filter);

        let envelope: EventsEnvelope = request
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?
            .json()
            .await
            .with_context(|| format!("GET {} returned an invalid envelope", url))?;

        if !envelope.success {
            bail!("Gateway reported failure fetching events");
        }
        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait]
impl ActionSubmitter for HttpGateway {
    async fn submit(&self, action: &SaleAction) -> Result<SubmitReceipt> {
        let url = format!("{}/actions", self.base_url);
        debug!("POST {} ({})", url, action.kind);

        let envelope: SubmitEnvelope = self
            .http
            .post(&url)
            .json(action)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?
            .error_for_status()
            .with_context(|| format!("POST {} returned an error status", url))?
            .json()
            .await
            .with_context(|| format!("POST {} returned an invalid envelope", url))?;

        if !envelope.success {
            bail!("Gateway rejected {} action", action.kind);
        }
        envelope
            .data
            .context("Gateway accepted the action but returned no reference id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_envelope_parses() {
        let body = r#"{
            "success": true,
            "data": [{
                "blockNumber": 12,
                "logIndex": 0,
                "transactionHash": "0xabc",
                "topics": ["0x0", "0x1", "0x2"],
                "data": "0x"
            }]
        }"#;
        let envelope: EventsEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap().len(), 1);
    }

    #[test]
    fn test_submit_envelope_parses() {
        let body = r#"{"success": true, "data": {"referenceId": "0xdeadbeef"}}"#;
        let envelope: SubmitEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.unwrap().reference_id, "0xdeadbeef");
    }
}
