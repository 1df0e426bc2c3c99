//! Negotiation records and derived state
//!
//! `SaleRequest` is the on-chain shape of a negotiation (raw boolean flags);
//! `Transaction` is the ledger-normalized row with a storage id, a derived
//! state, and the revision counter that drives bucket ordering.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::addr::{is_sentinel, same_participant};

/// Negotiation phase derived from the record's boolean flags.
///
/// The order is load-bearing: replay merges keep the highest state, and
/// later flags dominate earlier ones because settlement events can arrive
/// with several flags already set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TxState {
    None,
    Proposed,
    Approved,
    Pending,
    Confirmed,
    Finished,
}

impl TxState {
    /// Derive the phase from raw flags. Precedence: finished over confirmed
    /// over both-signed over approved over proposed.
    pub fn derive(request: &SaleRequest) -> TxState {
        if request.is_finished {
            TxState::Finished
        } else if request.is_confirmed {
            TxState::Confirmed
        } else if request.seller_approved && request.buyer_proposed {
            TxState::Pending
        } else if request.seller_approved {
            TxState::Approved
        } else if request.buyer_proposed {
            TxState::Proposed
        } else {
            TxState::None
        }
    }
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxState::None => write!(f, "None"),
            TxState::Proposed => write!(f, "Proposed"),
            TxState::Approved => write!(f, "Approved"),
            TxState::Pending => write!(f, "Pending"),
            TxState::Confirmed => write!(f, "Confirmed"),
            TxState::Finished => write!(f, "Finished"),
        }
    }
}

/// A sale negotiation as observed on chain: one seller/buyer/asset attempt.
///
/// Exactly one of seller/buyer may be the sentinel (an open auction or bid);
/// both bound means a direct negotiation, both sentinel is invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub asset_id: u64,
    pub seller: String,
    pub buyer: String,
    pub tokens: u64,
    pub funds: Decimal,
    pub seller_approved: bool,
    pub buyer_proposed: bool,
    pub is_confirmed: bool,
    pub is_finished: bool,
    pub is_withdraw: bool,
}

impl SaleRequest {
    /// True iff exactly one of seller/buyer is unbound.
    pub fn is_open_offer(&self) -> bool {
        is_sentinel(&self.seller) != is_sentinel(&self.buyer)
    }

    /// Terminal records never mutate again.
    pub fn is_terminal(&self) -> bool {
        self.is_finished || self.is_withdraw
    }

    /// Data-model invariant check: rejected records are never stored.
    pub fn validate(&self) -> Result<(), crate::error::LedgerError> {
        use crate::error::LedgerError;
        if is_sentinel(&self.seller) && is_sentinel(&self.buyer) {
            return Err(LedgerError::InvalidRecord(
                "seller and buyer cannot both be unassigned".to_string(),
            ));
        }
        if self.tokens == 0 {
            return Err(LedgerError::InvalidRecord(
                "token quantity must be greater than zero".to_string(),
            ));
        }
        if self.funds < Decimal::ZERO {
            return Err(LedgerError::InvalidRecord(
                "funds cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ledger-normalized negotiation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Storage key, assigned by the ledger
    pub id: u64,
    pub asset_id: u64,
    pub seller: String,
    pub buyer: String,
    pub tokens: u64,
    pub funds: Decimal,
    pub seller_approved: bool,
    pub buyer_proposed: bool,
    pub is_confirmed: bool,
    pub is_finished: bool,
    pub is_withdraw: bool,
    pub state: TxState,
    /// Ledger write sequence: most-recently-reconciled rows sort first
    #[serde(default)]
    pub revision: u64,
}

impl Transaction {
    /// Normalize a sale request into an unstored row (id and revision are
    /// assigned by the ledger on write).
    pub fn from_request(request: SaleRequest) -> Self {
        let state = TxState::derive(&request);
        Transaction {
            id: 0,
            asset_id: request.asset_id,
            seller: request.seller,
            buyer: request.buyer,
            tokens: request.tokens,
            funds: request.funds,
            seller_approved: request.seller_approved,
            buyer_proposed: request.buyer_proposed,
            is_confirmed: request.is_confirmed,
            is_finished: request.is_finished,
            is_withdraw: request.is_withdraw,
            state,
            revision: 0,
        }
    }

    /// Back to the wire shape: the four address/amount fields round-trip
    /// exactly, with no precision loss.
    pub fn to_request(&self) -> SaleRequest {
        SaleRequest {
            asset_id: self.asset_id,
            seller: self.seller.clone(),
            buyer: self.buyer.clone(),
            tokens: self.tokens,
            funds: self.funds,
            seller_approved: self.seller_approved,
            buyer_proposed: self.buyer_proposed,
            is_confirmed: self.is_confirmed,
            is_finished: self.is_finished,
            is_withdraw: self.is_withdraw,
        }
    }

    pub fn is_open_offer(&self) -> bool {
        is_sentinel(&self.seller) != is_sentinel(&self.buyer)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_finished || self.is_withdraw
    }

    /// Same record content, ignoring storage bookkeeping.
    pub fn same_content(&self, other: &Transaction) -> bool {
        self.asset_id == other.asset_id
            && same_participant(&self.seller, &other.seller)
            && same_participant(&self.buyer, &other.buyer)
            && self.tokens == other.tokens
            && self.funds == other.funds
            && self.seller_approved == other.seller_approved
            && self.buyer_proposed == other.buyer_proposed
            && self.is_confirmed == other.is_confirmed
            && self.is_finished == other.is_finished
            && self.is_withdraw == other.is_withdraw
    }
}

/// The viewer's relationship to a negotiation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Seller,
    Buyer,
    Observer,
}

/// Which role the viewer occupies on this record. The seller side wins if
/// a record somehow names the same participant on both ends.
pub fn role_of(tx: &Transaction, viewer: &str) -> Role {
    if !is_sentinel(&tx.seller) && same_participant(&tx.seller, viewer) {
        Role::Seller
    } else if !is_sentinel(&tx.buyer) && same_participant(&tx.buyer, viewer) {
        Role::Buyer
    } else {
        Role::Observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::SENTINEL_ADDRESS;
    use std::str::FromStr;

    pub(crate) fn request(seller: &str, buyer: &str) -> SaleRequest {
        SaleRequest {
            asset_id: 7,
            seller: seller.to_string(),
            buyer: buyer.to_string(),
            tokens: 10,
            funds: Decimal::from_str("2.5").unwrap(),
            seller_approved: false,
            buyer_proposed: false,
            is_confirmed: false,
            is_finished: false,
            is_withdraw: false,
        }
    }

    #[test]
    fn test_derive_precedence() {
        let mut r = request("0xA", "0xB");
        assert_eq!(TxState::derive(&r), TxState::None);

        r.buyer_proposed = true;
        assert_eq!(TxState::derive(&r), TxState::Proposed);

        r.buyer_proposed = false;
        r.seller_approved = true;
        assert_eq!(TxState::derive(&r), TxState::Approved);

        r.buyer_proposed = true;
        assert_eq!(TxState::derive(&r), TxState::Pending);

        r.is_confirmed = true;
        assert_eq!(TxState::derive(&r), TxState::Confirmed);

        r.is_finished = true;
        assert_eq!(TxState::derive(&r), TxState::Finished);
    }

    #[test]
    fn test_derive_is_monotonic_in_flags() {
        // Setting any additional flag never decreases the derived state.
        let flags = [
            |r: &mut SaleRequest| r.buyer_proposed = true,
            |r: &mut SaleRequest| r.seller_approved = true,
            |r: &mut SaleRequest| r.is_confirmed = true,
            |r: &mut SaleRequest| r.is_finished = true,
        ];
        for mask in 0u8..16 {
            let mut base = request("0xA", "0xB");
            for (i, set) in flags.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    set(&mut base);
                }
            }
            let before = TxState::derive(&base);
            for (i, set) in flags.iter().enumerate() {
                if mask & (1 << i) == 0 {
                    let mut raised = base.clone();
                    set(&mut raised);
                    assert!(
                        TxState::derive(&raised) >= before,
                        "flag {} lowered state from {:?}",
                        i,
                        before
                    );
                }
            }
        }
    }

    #[test]
    fn test_finish_event_with_all_flags_set() {
        // A finish event arrives with every prior flag already true even if
        // the intermediate events were missed.
        let mut r = request("0xA", "0xB");
        r.seller_approved = true;
        r.buyer_proposed = true;
        r.is_confirmed = true;
        r.is_finished = true;
        assert_eq!(TxState::derive(&r), TxState::Finished);
    }

    #[test]
    fn test_open_offer_and_validation() {
        let auction = request("0xA", SENTINEL_ADDRESS);
        assert!(auction.is_open_offer());
        assert!(auction.validate().is_ok());

        let bid = request(SENTINEL_ADDRESS, "0xB");
        assert!(bid.is_open_offer());
        assert!(bid.validate().is_ok());

        let direct = request("0xA", "0xB");
        assert!(!direct.is_open_offer());

        let unbound = request(SENTINEL_ADDRESS, SENTINEL_ADDRESS);
        assert!(unbound.validate().is_err());

        let mut zero_tokens = request("0xA", "0xB");
        zero_tokens.tokens = 0;
        assert!(zero_tokens.validate().is_err());
    }

    #[test]
    fn test_request_roundtrip_is_exact() {
        let mut r = request("0xAbCd567890abcdef1234567890abcdef12345678", "0xB");
        r.funds = Decimal::from_str("123456789.000000000000000001").unwrap();
        r.tokens = u64::MAX;
        let tx = Transaction::from_request(r.clone());
        assert_eq!(tx.to_request(), r);
    }

    #[test]
    fn test_role_of() {
        let tx = Transaction::from_request(request("0xAAA1", "0xBbB2"));
        assert_eq!(role_of(&tx, "0xaaa1"), Role::Seller);
        assert_eq!(role_of(&tx, "0xBBB2"), Role::Buyer);
        assert_eq!(role_of(&tx, "0xCCC3"), Role::Observer);

        // Sentinel never grants a role, even to a "sentinel viewer"
        let open = Transaction::from_request(request(SENTINEL_ADDRESS, "0xBbB2"));
        assert_eq!(role_of(&open, SENTINEL_ADDRESS), Role::Observer);
    }

    #[test]
    fn test_transaction_serde_shape() {
        let tx = Transaction::from_request(request("0xA", "0xB"));
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("assetId").is_some());
        assert!(json.get("sellerApproved").is_some());
        assert!(json.get("isWithdraw").is_some());
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert!(back.same_content(&tx));
    }
}
