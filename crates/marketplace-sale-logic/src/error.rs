//! Error taxonomy for the negotiation core
//!
//! Every failure here is recoverable: a bad event is skipped, a bad record
//! is never stored, and a rejected write leaves the ledger untouched.
//! Transport failures from the backend store and the event gateway stay
//! `anyhow` errors and propagate to the caller unchanged.

use thiserror::Error;

/// Rejections raised by the sale request ledger
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Record violates the data-model invariants: rejected, never stored
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// An unfinished, non-withdrawn row already exists for this
    /// (asset, seller, buyer) triple
    #[error("active negotiation already exists for asset {asset_id} ({seller} -> {buyer})")]
    DuplicateActiveNegotiation {
        asset_id: u64,
        seller: String,
        buyer: String,
    },

    /// Replay would move a stored record's derived state backward
    #[error("state regression rejected for asset {asset_id}: {detail}")]
    StateRegression { asset_id: u64, detail: String },
}

/// Rejections raised while decoding raw settlement events
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// Event is undecodable: skipped, the rest of the batch continues
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

impl EventError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        EventError::MalformedEvent(detail.into())
    }
}
