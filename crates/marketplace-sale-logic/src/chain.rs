//! Seams to the external ledger collaborators
//!
//! The core never talks to the chain directly. Implementations of these
//! traits (an HTTP gateway in production, fixtures in tests) own the IO,
//! its timeouts, and its retry policy. A failed submit mutates nothing
//! locally: the ledger only ever changes through reconciled events.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::events::RawSaleEvent;
use crate::lifecycle::ActionKind;

/// Filter for the event source. Empty filter means full history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

impl EventFilter {
    pub fn for_asset(asset_id: u64) -> Self {
        EventFilter {
            asset_id: Some(asset_id),
            participant: None,
        }
    }
}

/// A participant action bound for the external ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleAction {
    pub kind: ActionKind,
    pub asset_id: u64,
    pub seller: String,
    pub buyer: String,
    pub tokens: u64,
    pub funds: Decimal,
}

/// Acknowledgement from the external ledger. Acceptance only: the effect
/// becomes observable after a later reconcile pass picks up the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub reference_id: String,
}

/// Source of raw settlement events.
///
/// Each call returns the full matching history: no pagination, no cursor.
/// Reconciliation is built to be re-run against that history safely.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn get_raw_events(&self, filter: &EventFilter) -> Result<Vec<RawSaleEvent>>;
}

/// Submitter for participant actions.
#[async_trait]
pub trait ActionSubmitter: Send + Sync {
    async fn submit(&self, action: &SaleAction) -> Result<SubmitReceipt>;
}
