//! Participant address and sale-terms utilities
//!
//! Address comparison is case-insensitive everywhere. The original codebase
//! had several independent comparison sites with inconsistent case handling;
//! `same_participant` is the single authority now: every comparison in the
//! crate goes through it.

use rust_decimal::Decimal;

use crate::error::LedgerError;

/// The reserved "nobody" participant: an open auction or bid has this
/// address on the unbound side.
pub const SENTINEL_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// True iff the address is the unassigned sentinel (case-insensitive).
pub fn is_sentinel(address: &str) -> bool {
    same_participant(address, SENTINEL_ADDRESS)
}

/// Case-insensitive participant equality.
///
/// Malformed strings are simply unequal: this never panics and never
/// rejects input, so it is safe on anything an event log hands us.
pub fn same_participant(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// True iff the address is `0x` followed by 40 hex digits.
pub fn is_well_formed(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(rest) => rest.len() == 40 && rest.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Human-facing address rendering: `"Pending"` for the sentinel, `"You"`
/// for the viewer, else a `0x1234…abcd` truncation.
pub fn format_for_display(address: &str, viewer: &str) -> String {
    if is_sentinel(address) {
        return "Pending".to_string();
    }
    if same_participant(address, viewer) {
        return "You".to_string();
    }
    if address.len() > 10 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

/// Validate sale terms before they are submitted or stored.
///
/// `max_tokens` is the proposing party's declared balance cap: the
/// external ledger enforces the real balance, this only surfaces the
/// constraint to the caller up front.
pub fn validate_terms(tokens: u64, max_tokens: u64, funds: Decimal) -> Result<(), LedgerError> {
    if tokens == 0 {
        return Err(LedgerError::InvalidRecord(
            "token quantity must be greater than zero".to_string(),
        ));
    }
    if tokens > max_tokens {
        return Err(LedgerError::InvalidRecord(format!(
            "token quantity {} exceeds available balance {}",
            tokens, max_tokens
        )));
    }
    if funds <= Decimal::ZERO {
        return Err(LedgerError::InvalidRecord(
            "funds must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
