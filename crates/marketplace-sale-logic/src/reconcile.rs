//! Event reconciliation engine
//!
//! Translates the raw settlement event history into ledger upserts. The
//! event source gives no cursor or delivery-once guarantee (every poll can
//! replay from genesis), so a pass decodes everything, keeps the
//! highest-state record per negotiation, and merges idempotently. Running
//! the same batch twice leaves the ledger unchanged.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::events::{decode_event, RawSaleEvent};
use crate::ledger::SaleLedger;
use crate::store::BackendStore;
use crate::types::{SaleRequest, Transaction, TxState};

/// Counters from one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Rows written to the ledger (inserted or upgraded)
    pub applied: usize,
    /// Events dropped: undecodable or carrying invalid records
    pub skipped: usize,
    /// Merges rejected because they would move state backward
    pub rejected_regressions: usize,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.rejected_regressions == 0
    }
}

impl std::fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "applied={} skipped={} regressions={}",
            self.applied, self.skipped, self.rejected_regressions
        )
    }
}

/// Pick the winning record per `(asset, seller, buyer)` group.
///
/// Highest derived state wins; ties prefer `is_finished`, then
/// `is_confirmed`, then the earliest original position, so the result is
/// deterministic however the sources interleaved.
pub fn select_winners(decoded: Vec<SaleRequest>) -> Vec<SaleRequest> {
    let mut winners: Vec<SaleRequest> = Vec::new();
    let mut index: HashMap<(u64, String, String), usize> = HashMap::new();

    for candidate in decoded {
        let key = (
            candidate.asset_id,
            candidate.seller.to_ascii_lowercase(),
            candidate.buyer.to_ascii_lowercase(),
        );
        match index.get(&key) {
            None => {
                index.insert(key, winners.len());
                winners.push(candidate);
            }
            Some(&slot) => {
                let current = &winners[slot];
                let rank = |r: &SaleRequest| (TxState::derive(r), r.is_finished, r.is_confirmed);
                if rank(&candidate) > rank(current) {
                    winners[slot] = candidate;
                }
            }
        }
    }
    winners
}

/// Run one pure reconciliation pass over a raw event batch.
///
/// Each event decodes independently: one malformed event is skipped and
/// reported, never fatal to the batch. Decoded records are validated,
/// grouped, reduced to winners, and merged highest-state-wins.
pub fn reconcile(ledger: &mut SaleLedger, events: &[RawSaleEvent]) -> ReconciliationReport {
    let mut report = ReconciliationReport::default();
    let mut decoded: Vec<SaleRequest> = Vec::with_capacity(events.len());

    for event in events {
        match decode_event(event) {
            Ok(request) => {
                if let Err(e) = request.validate() {
                    warn!(
                        "Skipping invalid record from block {} log {}: {}",
                        event.block_number, event.log_index, e
                    );
                    report.skipped += 1;
                    continue;
                }
                decoded.push(request);
            }
            Err(e) => {
                warn!(
                    "Skipping undecodable event at block {} log {}: {}",
                    event.block_number, event.log_index, e
                );
                report.skipped += 1;
            }
        }
    }

    let winners = select_winners(decoded);
    debug!(
        "Reconciling {} event(s) -> {} negotiation group(s)",
        events.len(),
        winners.len()
    );

    let outcome = ledger.upsert_from_replay(
        winners.into_iter().map(Transaction::from_request).collect(),
    );
    report.applied = outcome.written;
    report.rejected_regressions = outcome.regressed;
    report
}

/// Reconcile a batch and push the resulting ledger delta to the backend
/// store.
///
/// `pushed_revision` is the caller's durable-write cursor: it only advances
/// after a successful bulk write, so rows merged during a failed push are
/// retried on the next pass. The in-memory merge always happens first; a
/// transport failure leaves the ledger at its last-reconciled state and
/// propagates unchanged.
pub async fn reconcile_and_store(
    ledger: &mut SaleLedger,
    events: &[RawSaleEvent],
    store: &BackendStore,
    pushed_revision: &mut u64,
) -> anyhow::Result<ReconciliationReport> {
    let report = reconcile(ledger, events);
    let delta = ledger.rows_since(*pushed_revision);
    if !delta.is_empty() {
        store.push(&delta).await?;
        debug!("Pushed {} row(s) to backend store", delta.len());
    }
    *pushed_revision = ledger.current_revision();
    Ok(report)
}
