//! Categorization of an asset's negotiation records for one viewer
//!
//! Partitions a record set into six disjoint buckets: every record lands in
//! exactly one, whoever is looking. Within a bucket, the most recently
//! reconciled records come first (ties broken by record id ascending).

use crate::addr::is_sentinel;
use crate::types::{role_of, Role, Transaction, TxState};

/// The six display buckets for one asset and viewer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CategorizedSales {
    /// Open offers the viewer could take (they are not bound to them)
    pub pending_bids: Vec<Transaction>,
    /// The viewer's own open offers, awaiting a counterparty
    pub pending_auctions: Vec<Transaction>,
    /// Bound negotiations waiting on the seller side
    pub pending_approvals: Vec<Transaction>,
    /// Bound negotiations waiting on the buyer side
    pub pending_proposals: Vec<Transaction>,
    /// Both parties signed; escrow/settlement underway
    pub in_progress: Vec<Transaction>,
    /// Finished or withdrawn
    pub completed: Vec<Transaction>,
}

impl CategorizedSales {
    pub fn total(&self) -> usize {
        self.pending_bids.len()
            + self.pending_auctions.len()
            + self.pending_approvals.len()
            + self.pending_proposals.len()
            + self.in_progress.len()
            + self.completed.len()
    }
}

/// Which bucket a single record belongs to, relative to the viewer.
fn bucket_of(tx: &Transaction, viewer: &str) -> Bucket {
    if tx.is_terminal() {
        return Bucket::Completed;
    }

    let role = role_of(tx, viewer);
    if is_sentinel(&tx.seller) || is_sentinel(&tx.buyer) {
        // Open offer: the bound participant watches their own auction/bid;
        // everyone else sees an offer they could take.
        return if role == Role::Observer {
            Bucket::PendingBids
        } else {
            Bucket::PendingAuctions
        };
    }

    match tx.state {
        TxState::Pending | TxState::Confirmed => Bucket::InProgress,
        // Finished is terminal and handled above; kept for exhaustiveness
        TxState::Finished => Bucket::Completed,
        _ => match role {
            Role::Seller => Bucket::PendingApprovals,
            Role::Buyer => Bucket::PendingProposals,
            // Spectators are bucketed by whose turn it is
            Role::Observer => {
                if tx.state == TxState::Approved {
                    Bucket::PendingProposals
                } else {
                    Bucket::PendingApprovals
                }
            }
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    PendingBids,
    PendingAuctions,
    PendingApprovals,
    PendingProposals,
    InProgress,
    Completed,
}

/// Partition the records for one asset into the six buckets.
pub fn categorize(records: &[Transaction], viewer: &str) -> CategorizedSales {
    let mut sorted: Vec<Transaction> = records.to_vec();
    sorted.sort_by(|a, b| b.revision.cmp(&a.revision).then(a.id.cmp(&b.id)));

    let mut out = CategorizedSales::default();
    for tx in sorted {
        match bucket_of(&tx, viewer) {
            Bucket::PendingBids => out.pending_bids.push(tx),
            Bucket::PendingAuctions => out.pending_auctions.push(tx),
            Bucket::PendingApprovals => out.pending_approvals.push(tx),
            Bucket::PendingProposals => out.pending_proposals.push(tx),
            Bucket::InProgress => out.in_progress.push(tx),
            Bucket::Completed => out.completed.push(tx),
        }
    }
    out
}
