//! Record types for quest verification results
//!
//! These structs are what the checkers cache and return.
//! They use postcard for binary serialization when persisted.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Checker-specific decoded fields of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionDetail {
    /// Plain contract call, nothing decoded
    None,
    /// NFT minted to the user
    Mint { token_id: U256 },
    /// Stake into a vault, amounts in base units
    Stake { amount: U256, lock_period: U256 },
}

/// A transaction that satisfied a checker's full predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Transaction hash (dedup key)
    pub transaction_hash: B256,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Sender (zero address for mints)
    pub from: Address,
    /// Recipient (the user for mints)
    pub to: Address,
    /// Raw call data (empty when only the event was inspected)
    pub input: Vec<u8>,
    /// First 4 bytes of `input` as `0x`-prefixed lower-case hex
    pub method_id: Option<String>,
    /// Decoded checker-specific fields
    pub detail: InteractionDetail,
}

impl Interaction {
    /// Build an interaction, deriving `method_id` from `input`.
    pub fn new(
        transaction_hash: B256,
        block_number: u64,
        from: Address,
        to: Address,
        input: Vec<u8>,
        detail: InteractionDetail,
    ) -> Self {
        let method_id = method_id_of(&input);
        Self {
            transaction_hash,
            block_number,
            from,
            to,
            input,
            method_id,
            detail,
        }
    }
}

/// Hex-encode the 4-byte selector of `input`, if it has one.
pub fn method_id_of(input: &[u8]) -> Option<String> {
    input
        .get(..4)
        .map(|selector| format!("0x{}", hex::encode(selector)))
}

/// Per-(checker, address) scan progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    /// Lower-case `0x` hex address, the cache key
    pub address: String,
    /// Matches in discovery order (not necessarily block order)
    pub matches: Vec<Interaction>,
    /// Highest block already covered by a scan
    pub last_scanned_block: Option<u64>,
    /// Unix seconds of the last successful scan
    pub fetched_at: u64,
}

impl ScanState {
    /// Empty state for an address key.
    pub fn new(address: String) -> Self {
        Self {
            address,
            matches: Vec::new(),
            last_scanned_block: None,
            fetched_at: 0,
        }
    }

    /// Whether a transaction is already recorded.
    pub fn contains(&self, hash: &B256) -> bool {
        self.matches.iter().any(|m| &m.transaction_hash == hash)
    }

    /// Add a match unless its transaction hash is already present.
    ///
    /// Returns true if the match was inserted.
    pub fn absorb(&mut self, interaction: Interaction) -> bool {
        if self.contains(&interaction.transaction_hash) {
            return false;
        }
        self.matches.push(interaction);
        true
    }

    /// Record that blocks up to `block` have been scanned. Never moves backwards.
    pub fn advance(&mut self, block: u64) {
        self.last_scanned_block = Some(self.last_scanned_block.map_or(block, |b| b.max(block)));
    }

    /// Stamp the state with the current time.
    pub fn touch(&mut self) {
        self.fetched_at = unix_now();
    }

    /// Whether the state is older than `ttl_secs` at time `now`.
    pub fn is_stale(&self, ttl_secs: Option<u64>, now: u64) -> bool {
        match ttl_secs {
            Some(ttl) => now.saturating_sub(self.fetched_at) >= ttl,
            None => false,
        }
    }

    /// Most recent match by block number.
    pub fn latest(&self) -> Option<&Interaction> {
        self.matches.iter().max_by_key(|m| m.block_number)
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
