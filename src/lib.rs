//! questcheck - on-chain quest verification
//!
//! Decides whether a wallet completed a quest (minted an NFT, staked in a
//! vault, interacted with a contract) by scanning event logs over a bounded
//! block window and checking the originating transactions. Scan results are
//! cached per checker and address so repeat checks only look at new blocks.

pub mod types;
pub mod rpc;
pub mod records;
pub mod error;

// Scan state storage
pub mod keys;
pub mod store;
pub mod cache;

// Quest checking
pub mod planner;
pub mod rule;
pub mod rule_nft;
pub mod rule_stake;
pub mod rule_interaction;
pub mod checker;
pub mod retry;
pub mod registry;

pub mod config;
pub mod cli;

#[cfg(test)]
mod testing;

// Re-export the main types for convenience
pub use cache::MemoryScanStore;
pub use checker::{Checker, CheckerSettings};
pub use config::QuestConfig;
pub use error::{Verdict, VerifyError};
pub use records::{Interaction, InteractionDetail, ScanState};
pub use registry::QuestBook;
pub use retry::RetryOpts;
pub use rpc::{ChainReader, RpcClient};
pub use rule::{Decision, MatchRule, RejectReason};
pub use store::{RocksScanStore, ScanStore};
