//! Sale request ledger: the authoritative store of negotiation rows
//!
//! One row per seller/buyer/asset attempt. Rows are created by participant
//! actions or by reconciliation replay, mutated only by replay, and frozen
//! once finished or withdrawn. Replay merges are highest-state-wins: the
//! event source may be replayed from genesis on every poll, so a pass must
//! be safe to re-run against full history without corrupting anything.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::addr::is_sentinel;
use crate::error::LedgerError;
use crate::types::{SaleRequest, Transaction, TxState};

/// Key identifying a negotiation at the protocol level.
/// Addresses are folded to lowercase so comparison sites cannot drift.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TripleKey {
    asset_id: u64,
    seller: String,
    buyer: String,
}

impl TripleKey {
    fn of(asset_id: u64, seller: &str, buyer: &str) -> Self {
        TripleKey {
            asset_id,
            seller: seller.to_ascii_lowercase(),
            buyer: buyer.to_ascii_lowercase(),
        }
    }
}

/// Outcome of a bulk replay merge.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Rows inserted or overwritten
    pub written: usize,
    /// Incoming records rejected because they would move state backward
    pub regressed: usize,
}

/// In-memory negotiation store with replay-safe merge semantics.
pub struct SaleLedger {
    rows: BTreeMap<u64, Transaction>,
    /// Latest row per protocol triple: older attempts stay as history
    latest: HashMap<TripleKey, u64>,
    next_id: u64,
    revision: u64,
}

impl Default for SaleLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SaleLedger {
    pub fn new() -> Self {
        SaleLedger {
            rows: BTreeMap::new(),
            latest: HashMap::new(),
            next_id: 1,
            revision: 0,
        }
    }

    /// Current write sequence. Rows written after this point can be
    /// collected with [`rows_since`](Self::rows_since).
    pub fn current_revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows for one asset, any state. Unknown assets yield an empty
    /// vec, not an error: callers re-sort via categorization.
    pub fn list_by_asset(&self, asset_id: u64) -> Vec<Transaction> {
        self.rows
            .values()
            .filter(|tx| tx.asset_id == asset_id)
            .cloned()
            .collect()
    }

    /// Every stored row.
    pub fn all(&self) -> Vec<Transaction> {
        self.rows.values().cloned().collect()
    }

    /// Rows written after the given revision: the delta a reconcile pass
    /// pushes to the backend store.
    pub fn rows_since(&self, revision: u64) -> Vec<Transaction> {
        self.rows
            .values()
            .filter(|tx| tx.revision > revision)
            .cloned()
            .collect()
    }

    /// Insert a fresh negotiation row from a participant action.
    ///
    /// Fails with `DuplicateActiveNegotiation` when an unfinished,
    /// non-withdrawn row already exists for the triple. The row starts at
    /// state `None`; flags only ever arrive through reconciled events.
    pub fn create(&mut self, request: SaleRequest) -> Result<u64, LedgerError> {
        request.validate()?;
        let key = TripleKey::of(request.asset_id, &request.seller, &request.buyer);
        if let Some(existing) = self.latest.get(&key).and_then(|id| self.rows.get(id)) {
            if !existing.is_terminal() {
                return Err(LedgerError::DuplicateActiveNegotiation {
                    asset_id: request.asset_id,
                    seller: request.seller,
                    buyer: request.buyer,
                });
            }
        }

        let mut tx = Transaction::from_request(request);
        tx.seller_approved = false;
        tx.buyer_proposed = false;
        tx.is_confirmed = false;
        tx.is_finished = false;
        tx.is_withdraw = false;
        tx.state = TxState::None;

        let id = self.insert_row(tx, key);
        Ok(id)
    }

    /// Bulk idempotent merge from replayed events.
    ///
    /// Per record: no existing row → insert; existing row at lower or equal
    /// state → overwrite; regression → reject and log, keep the stored row.
    /// Terminal rows accept only an identical re-application.
    pub fn upsert_from_replay(&mut self, records: Vec<Transaction>) -> ReplayOutcome {
        let mut outcome = ReplayOutcome::default();
        for incoming in records {
            if let Err(e) = incoming.to_request().validate() {
                warn!("Replay record rejected, not stored: {}", e);
                continue;
            }
            let key = TripleKey::of(incoming.asset_id, &incoming.seller, &incoming.buyer);
            match self.latest.get(&key).and_then(|id| self.rows.get(id)).cloned() {
                None => {
                    debug!(
                        "Replay insert: asset {} {} -> {} at {}",
                        incoming.asset_id, incoming.seller, incoming.buyer, incoming.state
                    );
                    self.insert_row(incoming, key);
                    outcome.written += 1;
                }
                Some(existing) => {
                    if existing.same_content(&incoming) {
                        // Full-history replay lands here on every poll
                        continue;
                    }
                    if existing.is_terminal() || incoming.state < existing.state {
                        warn!(
                            "State regression rejected for asset {} ({} -> {}): stored {}, incoming {}",
                            incoming.asset_id,
                            incoming.seller,
                            incoming.buyer,
                            existing.state,
                            incoming.state
                        );
                        outcome.regressed += 1;
                        continue;
                    }
                    self.revision += 1;
                    let mut updated = incoming;
                    updated.id = existing.id;
                    updated.revision = self.revision;
                    self.rows.insert(existing.id, updated);
                    outcome.written += 1;
                }
            }
        }
        outcome
    }

    fn insert_row(&mut self, mut tx: Transaction, key: TripleKey) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.revision += 1;
        tx.id = id;
        tx.revision = self.revision;
        self.rows.insert(id, tx);
        self.latest.insert(key, id);
        id
    }

    /// Count of open offers (exactly one end bound) for an asset: handy
    /// for log lines and display summaries.
    pub fn open_offers(&self, asset_id: u64) -> usize {
        self.rows
            .values()
            .filter(|tx| {
                tx.asset_id == asset_id
                    && !tx.is_terminal()
                    && (is_sentinel(&tx.seller) != is_sentinel(&tx.buyer))
            })
            .count()
    }
}
