//! Negotiation state machine: pure phase logic
//!
//! Given a ledger row and the viewer's identity, computes who the protocol
//! is waiting on, the human-facing status line, and the single action the
//! viewer may take next. No hidden state: everything derives from the row.
//!
//! Phase transitions (actor in parentheses):
//!   open auction --place bid (non-seller)--> Proposed
//!   open bid --accept (non-buyer)--> Proposed
//!   Proposed --approve sale (seller)--> Approved
//!   Approved --propose purchase (buyer)--> Pending
//!   Pending --confirm sale (seller)--> Confirmed
//!   Confirmed --finish transaction (buyer)--> Finished
//!   any non-finished --withdraw (either bound party)--> Withdrawn

use serde::{Deserialize, Serialize};

use crate::addr::is_sentinel;
use crate::types::{role_of, Role, Transaction, TxState};

/// Actions a participant can submit to the external ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    PlaceBid,
    AcceptAuction,
    ProposePurchase,
    ApproveSale,
    ConfirmSale,
    FinishTransaction,
    Withdraw,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::PlaceBid => write!(f, "place bid"),
            ActionKind::AcceptAuction => write!(f, "accept auction"),
            ActionKind::ProposePurchase => write!(f, "propose purchase"),
            ActionKind::ApproveSale => write!(f, "approve sale"),
            ActionKind::ConfirmSale => write!(f, "confirm sale"),
            ActionKind::FinishTransaction => write!(f, "finish transaction"),
            ActionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// The party the protocol currently waits on, if any.
///
/// Open offers wait on whichever side is unbound; bound negotiations
/// alternate seller/buyer per the transition table.
pub fn next_actor(tx: &Transaction) -> Option<Role> {
    if tx.is_terminal() {
        return None;
    }
    if is_sentinel(&tx.seller) {
        return Some(Role::Seller);
    }
    if is_sentinel(&tx.buyer) {
        return Some(Role::Buyer);
    }
    match tx.state {
        TxState::None | TxState::Proposed => Some(Role::Seller),
        TxState::Approved => Some(Role::Buyer),
        TxState::Pending => Some(Role::Seller),
        TxState::Confirmed => Some(Role::Buyer),
        TxState::Finished => None,
    }
}

/// Human-facing waiting-on message, parameterized by the viewer's role.
///
/// A spectator always gets the generic role name, never "You".
pub fn describe_status(tx: &Transaction, viewer: &str) -> String {
    if tx.is_withdraw {
        return "Withdrawn".to_string();
    }
    if tx.is_finished {
        return "Completed".to_string();
    }
    if is_sentinel(&tx.seller) {
        return "Waiting for a Seller".to_string();
    }
    if is_sentinel(&tx.buyer) {
        return "Waiting for a Buyer".to_string();
    }

    fn party_name(viewer_role: Role, waited_on: Role) -> &'static str {
        if viewer_role == waited_on {
            "Your"
        } else if waited_on == Role::Seller {
            "Seller"
        } else {
            "Buyer"
        }
    }

    let role = role_of(tx, viewer);
    match tx.state {
        TxState::None => "Waiting...".to_string(),
        TxState::Proposed => format!("Waiting for {} Approval", party_name(role, Role::Seller)),
        TxState::Approved => format!("Waiting for {} Confirmation", party_name(role, Role::Buyer)),
        TxState::Pending => format!("Waiting for {} Confirmation", party_name(role, Role::Seller)),
        TxState::Confirmed => format!("Waiting for {} Payment", party_name(role, Role::Buyer)),
        TxState::Finished => "Completed".to_string(),
    }
}

/// The single next action this viewer is entitled to perform, or `None`.
///
/// Open offers are actionable by any participant not already bound to the
/// record; they are the prospective counterparty, not a spectator. On a
/// fully-bound negotiation a third party never gets an action. A bound
/// party whose counterpart holds the next move may still withdraw.
pub fn available_action(tx: &Transaction, viewer: &str) -> Option<ActionKind> {
    if tx.is_terminal() {
        return None;
    }

    let role = role_of(tx, viewer);
    if is_sentinel(&tx.buyer) {
        // Open auction: the seller waits, anyone else may bid
        return match role {
            Role::Seller => Some(ActionKind::Withdraw),
            _ => Some(ActionKind::PlaceBid),
        };
    }
    if is_sentinel(&tx.seller) {
        // Open bid: the buyer waits, anyone else may accept
        return match role {
            Role::Buyer => Some(ActionKind::Withdraw),
            _ => Some(ActionKind::AcceptAuction),
        };
    }

    match (tx.state, role) {
        (_, Role::Observer) => None,
        (TxState::None, Role::Buyer) => Some(ActionKind::ProposePurchase),
        (TxState::None, Role::Seller) => Some(ActionKind::Withdraw),
        (TxState::Proposed, Role::Seller) => Some(ActionKind::ApproveSale),
        (TxState::Proposed, Role::Buyer) => Some(ActionKind::Withdraw),
        (TxState::Approved, Role::Buyer) => Some(ActionKind::ProposePurchase),
        (TxState::Approved, Role::Seller) => Some(ActionKind::Withdraw),
        (TxState::Pending, Role::Seller) => Some(ActionKind::ConfirmSale),
        (TxState::Pending, Role::Buyer) => Some(ActionKind::Withdraw),
        (TxState::Confirmed, Role::Buyer) => Some(ActionKind::FinishTransaction),
        (TxState::Confirmed, Role::Seller) => Some(ActionKind::Withdraw),
        (TxState::Finished, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::SENTINEL_ADDRESS;
    use crate::types::SaleRequest;
    use rust_decimal::Decimal;

    const SELLER: &str = "0x1111111111111111111111111111111111111111";
    const BUYER: &str = "0x2222222222222222222222222222222222222222";
    const OTHER: &str = "0x3333333333333333333333333333333333333333";

    fn tx_at(state: TxState) -> Transaction {
        let mut request = SaleRequest {
            asset_id: 7,
            seller: SELLER.to_string(),
            buyer: BUYER.to_string(),
            tokens: 10,
            funds: Decimal::ONE,
            seller_approved: false,
            buyer_proposed: false,
            is_confirmed: false,
            is_finished: false,
            is_withdraw: false,
        };
        match state {
            TxState::None => {}
            TxState::Proposed => request.buyer_proposed = true,
            TxState::Approved => request.seller_approved = true,
            TxState::Pending => {
                request.seller_approved = true;
                request.buyer_proposed = true;
            }
            TxState::Confirmed => {
                request.seller_approved = true;
                request.buyer_proposed = true;
                request.is_confirmed = true;
            }
            TxState::Finished => {
                request.seller_approved = true;
                request.buyer_proposed = true;
                request.is_confirmed = true;
                request.is_finished = true;
            }
        }
        Transaction::from_request(request)
    }

    #[test]
    fn test_describe_status_per_role() {
        let proposed = tx_at(TxState::Proposed);
        assert_eq!(describe_status(&proposed, SELLER), "Waiting for Your Approval");
        assert_eq!(describe_status(&proposed, BUYER), "Waiting for Seller Approval");
        assert_eq!(describe_status(&proposed, OTHER), "Waiting for Seller Approval");

        let approved = tx_at(TxState::Approved);
        assert_eq!(describe_status(&approved, BUYER), "Waiting for Your Confirmation");
        assert_eq!(describe_status(&approved, SELLER), "Waiting for Buyer Confirmation");

        let pending = tx_at(TxState::Pending);
        assert_eq!(describe_status(&pending, SELLER), "Waiting for Your Confirmation");
        assert_eq!(describe_status(&pending, BUYER), "Waiting for Seller Confirmation");
        assert_eq!(describe_status(&pending, OTHER), "Waiting for Seller Confirmation");

        let confirmed = tx_at(TxState::Confirmed);
        assert_eq!(describe_status(&confirmed, BUYER), "Waiting for Your Payment");
        assert_eq!(describe_status(&confirmed, SELLER), "Waiting for Buyer Payment");
    }

    #[test]
    fn test_describe_status_terminal_and_open() {
        let finished = tx_at(TxState::Finished);
        assert_eq!(describe_status(&finished, SELLER), "Completed");

        let mut withdrawn = tx_at(TxState::Proposed);
        withdrawn.is_withdraw = true;
        assert_eq!(describe_status(&withdrawn, BUYER), "Withdrawn");

        let mut open_bid = tx_at(TxState::None);
        open_bid.seller = SENTINEL_ADDRESS.to_string();
        assert_eq!(describe_status(&open_bid, BUYER), "Waiting for a Seller");

        let mut open_auction = tx_at(TxState::None);
        open_auction.buyer = SENTINEL_ADDRESS.to_string();
        assert_eq!(describe_status(&open_auction, OTHER), "Waiting for a Buyer");
    }

    #[test]
    fn test_available_action_walks_the_happy_path() {
        assert_eq!(
            available_action(&tx_at(TxState::Proposed), SELLER),
            Some(ActionKind::ApproveSale)
        );
        assert_eq!(
            available_action(&tx_at(TxState::Approved), BUYER),
            Some(ActionKind::ProposePurchase)
        );
        assert_eq!(
            available_action(&tx_at(TxState::Pending), SELLER),
            Some(ActionKind::ConfirmSale)
        );
        assert_eq!(
            available_action(&tx_at(TxState::Confirmed), BUYER),
            Some(ActionKind::FinishTransaction)
        );
        assert_eq!(available_action(&tx_at(TxState::Finished), BUYER), None);
    }

    #[test]
    fn test_waiting_party_may_withdraw() {
        assert_eq!(
            available_action(&tx_at(TxState::Proposed), BUYER),
            Some(ActionKind::Withdraw)
        );
        assert_eq!(
            available_action(&tx_at(TxState::Confirmed), SELLER),
            Some(ActionKind::Withdraw)
        );
    }

    #[test]
    fn test_spectator_gets_no_action_on_bound_negotiation() {
        for state in [
            TxState::None,
            TxState::Proposed,
            TxState::Approved,
            TxState::Pending,
            TxState::Confirmed,
            TxState::Finished,
        ] {
            assert_eq!(available_action(&tx_at(state), OTHER), None);
        }
    }

    #[test]
    fn test_open_offers_are_actionable_by_non_parties() {
        let mut auction = tx_at(TxState::None);
        auction.buyer = SENTINEL_ADDRESS.to_string();
        assert_eq!(available_action(&auction, OTHER), Some(ActionKind::PlaceBid));
        assert_eq!(available_action(&auction, SELLER), Some(ActionKind::Withdraw));

        let mut bid = tx_at(TxState::None);
        bid.seller = SENTINEL_ADDRESS.to_string();
        assert_eq!(available_action(&bid, OTHER), Some(ActionKind::AcceptAuction));
        assert_eq!(available_action(&bid, BUYER), Some(ActionKind::Withdraw));
    }

    #[test]
    fn test_withdrawn_record_has_no_action() {
        let mut withdrawn = tx_at(TxState::Pending);
        withdrawn.is_withdraw = true;
        assert_eq!(available_action(&withdrawn, SELLER), None);
        assert_eq!(available_action(&withdrawn, BUYER), None);
    }

    #[test]
    fn test_next_actor() {
        assert_eq!(next_actor(&tx_at(TxState::Proposed)), Some(Role::Seller));
        assert_eq!(next_actor(&tx_at(TxState::Approved)), Some(Role::Buyer));
        assert_eq!(next_actor(&tx_at(TxState::Pending)), Some(Role::Seller));
        assert_eq!(next_actor(&tx_at(TxState::Confirmed)), Some(Role::Buyer));
        assert_eq!(next_actor(&tx_at(TxState::Finished)), None);
    }
}
