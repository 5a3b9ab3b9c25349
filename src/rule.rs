//! Match rule trait for quest checkers
//!
//! Every quest is checked the same way: fetch candidate logs from one
//! contract, then decide per log whether it proves the quest for the user.
//! A `MatchRule` supplies the two quest-specific pieces (which logs, and
//! how to judge one); the engine in `checker.rs` does the rest.

use crate::records::Interaction;
use crate::rpc::ChainReader;
use crate::types::{Log, LogFilter};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Result of judging one candidate log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The log's transaction satisfies the full predicate.
    Accept(Interaction),
    /// The log does not prove the quest; keep scanning.
    Reject(RejectReason),
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    SenderMismatch,
    RecipientMismatch,
    MethodMismatch,
    BelowThreshold { amount: U256, minimum: U256 },
    Malformed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::SenderMismatch => write!(f, "sender is not the user"),
            RejectReason::RecipientMismatch => write!(f, "recipient is not a tracked contract"),
            RejectReason::MethodMismatch => write!(f, "call data does not start with the selector"),
            RejectReason::BelowThreshold { amount, minimum } => {
                write!(f, "amount {} below minimum {}", amount, minimum)
            }
            RejectReason::Malformed(msg) => write!(f, "malformed log: {}", msg),
        }
    }
}

/// Quest-specific half of a checker.
#[async_trait]
pub trait MatchRule: Send + Sync {
    /// Human-readable name for logging.
    fn kind(&self) -> &'static str;

    /// Contract and topics to request. The engine fills in the block range.
    fn log_filter(&self, user: Address) -> LogFilter;

    /// Judge one candidate log for `user`.
    ///
    /// An `Err` means the candidate could not be checked (e.g. its
    /// transaction was not returned); the engine logs and skips it.
    async fn evaluate(&self, chain: &dyn ChainReader, user: Address, log: &Log)
        -> Result<Decision>;

    /// Stop scanning at the first accepted match.
    fn early_exit(&self) -> bool {
        true
    }
}

/// 100 tokens with 18 decimals, in base units.
pub fn default_min_stake() -> U256 {
    U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64))
}

/// Read a big-endian uint256 word from `bytes` at word `index`.
pub(crate) fn read_word(bytes: &[u8], index: usize) -> Option<U256> {
    let start = index * 32;
    bytes.get(start..start + 32).map(U256::from_be_slice)
}
