//! Raw settlement events and their decoding
//!
//! Events arrive log-shaped from the chain gateway: indexed seller/buyer
//! topics plus an ABI data payload of 32-byte words. Decoding is strict,
//! anything missing, non-hex, or out of range is a `MalformedEvent`, but
//! a single bad event never aborts a batch; reconciliation skips it and
//! keeps going.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::addr::is_well_formed;
use crate::error::EventError;
use crate::types::SaleRequest;

/// Wei-style fixed-point scale used for fund amounts in event payloads.
const FUNDS_SCALE: u32 = 18;

/// Number of 32-byte words in a settlement event payload:
/// asset id, tokens, funds, and the five lifecycle flags.
const SETTLEMENT_WORDS: usize = 8;

/// A raw settlement event as delivered by the event source.
///
/// `topics[1]` and `topics[2]` carry the seller and buyer addresses;
/// `data` is the hex-encoded ABI payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSaleEvent {
    pub block_number: u64,
    pub log_index: u64,
    #[serde(default)]
    pub transaction_hash: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// Decode a raw settlement event into a ledger-shaped sale request.
pub fn decode_event(event: &RawSaleEvent) -> Result<SaleRequest, EventError> {
    if event.topics.len() < 3 {
        return Err(EventError::malformed(format!(
            "expected 3 topics, got {}",
            event.topics.len()
        )));
    }

    let seller = word_to_address(&decode_word(&event.topics[1])?)?;
    let buyer = word_to_address(&decode_word(&event.topics[2])?)?;

    let words = decode_words(&event.data)?;
    if words.len() != SETTLEMENT_WORDS {
        return Err(EventError::malformed(format!(
            "expected {} data words, got {}",
            SETTLEMENT_WORDS,
            words.len()
        )));
    }

    Ok(SaleRequest {
        asset_id: word_to_u64(&words[0])?,
        seller,
        buyer,
        tokens: word_to_u64(&words[1])?,
        funds: word_to_funds(&words[2])?,
        seller_approved: word_to_bool(&words[3])?,
        buyer_proposed: word_to_bool(&words[4])?,
        is_confirmed: word_to_bool(&words[5])?,
        is_finished: word_to_bool(&words[6])?,
        is_withdraw: word_to_bool(&words[7])?,
    })
}

/// Split a hex payload into 32-byte ABI words.
pub fn decode_words(data: &str) -> Result<Vec<[u8; 32]>, EventError> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(stripped)
        .map_err(|e| EventError::malformed(format!("payload is not hex: {}", e)))?;
    if bytes.len() % 32 != 0 {
        return Err(EventError::malformed(format!(
            "payload length {} is not word-aligned",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

fn decode_word(hex_word: &str) -> Result<[u8; 32], EventError> {
    let stripped = hex_word.strip_prefix("0x").unwrap_or(hex_word);
    let bytes = hex::decode(stripped)
        .map_err(|e| EventError::malformed(format!("topic is not hex: {}", e)))?;
    if bytes.len() != 32 {
        return Err(EventError::malformed(format!(
            "topic is {} bytes, expected 32",
            bytes.len()
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes);
    Ok(word)
}

/// Interpret a word as a u64 quantity. The upper 24 bytes must be zero.
pub fn word_to_u64(word: &[u8; 32]) -> Result<u64, EventError> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(EventError::malformed("quantity exceeds u64 range"));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

/// Interpret a word as a boolean flag: strictly zero or one.
pub fn word_to_bool(word: &[u8; 32]) -> Result<bool, EventError> {
    if word[..31].iter().any(|&b| b != 0) || word[31] > 1 {
        return Err(EventError::malformed("flag word is not 0 or 1"));
    }
    Ok(word[31] == 1)
}

/// Interpret a word as an address: 12 zero bytes then 20 address bytes.
pub fn word_to_address(word: &[u8; 32]) -> Result<String, EventError> {
    if word[..12].iter().any(|&b| b != 0) {
        return Err(EventError::malformed("address word has non-zero padding"));
    }
    let address = format!("0x{}", hex::encode(&word[12..]));
    // encode() always yields well-formed hex; the check guards the contract
    debug_assert!(is_well_formed(&address));
    Ok(address)
}

/// Interpret a word as a wei-scaled fund amount, producing an exact
/// 18-decimal `Decimal`. The decimal mantissa holds 96 bits; anything
/// larger is rejected rather than rounded.
pub fn word_to_funds(word: &[u8; 32]) -> Result<Decimal, EventError> {
    if word[..16].iter().any(|&b| b != 0) {
        return Err(EventError::malformed("fund amount exceeds supported range"));
    }
    let mut tail = [0u8; 16];
    tail.copy_from_slice(&word[16..]);
    let raw = u128::from_be_bytes(tail);
    if raw >> 96 != 0 {
        return Err(EventError::malformed("fund amount exceeds supported range"));
    }
    Ok(Decimal::from_i128_with_scale(raw as i128, FUNDS_SCALE).normalize())
}
