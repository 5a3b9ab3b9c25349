//! Vault stake rules
//!
//! Two ways to prove a stake of at least `min_stake` base units:
//! - `StakeEventRule`: `Staked(address indexed vault, uint256 amount, uint256 lockPeriod)`
//!   events of the stake manager, with the originating transaction sent by the user.
//! - `StakeMethodRule`: any log of the vault whose transaction was sent by the user
//!   to the vault with `stake(uint256,uint256)` call data.
//!
//! A stake below the minimum is rejected but does not stop the scan.

use crate::records::{Interaction, InteractionDetail};
use crate::rpc::ChainReader;
use crate::rule::{read_word, Decision, MatchRule, RejectReason};
use crate::types::{Log, LogFilter};
use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// keccak256("Staked(address,uint256,uint256)")
pub const STAKED_TOPIC: B256 = B256::new([
    0x14, 0x49, 0xc6, 0xdd, 0x78, 0x51, 0xab, 0xc3, 0x0a, 0xbf, 0x37, 0xf5, 0x77, 0x15, 0xf4,
    0x92, 0x01, 0x05, 0x19, 0x14, 0x7c, 0xc2, 0x65, 0x2f, 0xbc, 0x38, 0x20, 0x2c, 0x18, 0xa6,
    0xee, 0x90,
]);

/// First 4 bytes of keccak256("stake(uint256,uint256)")
pub const STAKE_SELECTOR: [u8; 4] = [0x7b, 0x04, 0x72, 0xf0];

fn threshold_check(amount: U256, minimum: U256) -> Option<RejectReason> {
    if amount < minimum {
        Some(RejectReason::BelowThreshold { amount, minimum })
    } else {
        None
    }
}

/// Event-based stake rule.
pub struct StakeEventRule {
    stake_manager: Address,
    min_stake: U256,
}

impl StakeEventRule {
    pub fn new(stake_manager: Address, min_stake: U256) -> Self {
        Self {
            stake_manager,
            min_stake,
        }
    }
}

#[async_trait]
impl MatchRule for StakeEventRule {
    fn kind(&self) -> &'static str {
        "stake-event"
    }

    fn log_filter(&self, _user: Address) -> LogFilter {
        LogFilter::new(self.stake_manager).with_topics(vec![Some(STAKED_TOPIC)])
    }

    async fn evaluate(
        &self,
        chain: &dyn ChainReader,
        user: Address,
        log: &Log,
    ) -> Result<Decision> {
        if log.topic(0) != Some(STAKED_TOPIC) {
            return Ok(Decision::Reject(RejectReason::Malformed(
                "not a Staked event".to_string(),
            )));
        }
        let (Some(amount), Some(lock_period)) = (read_word(&log.data, 0), read_word(&log.data, 1))
        else {
            return Ok(Decision::Reject(RejectReason::Malformed(
                format!("Staked data is {} bytes, expected 64", log.data.len()),
            )));
        };

        // Amount is in the log, so sub-threshold stakes cost no transaction fetch
        if let Some(reason) = threshold_check(amount, self.min_stake) {
            debug!("Skipping stake in tx {:?}: {}", log.transaction_hash, reason);
            return Ok(Decision::Reject(reason));
        }

        let tx = chain.get_transaction(log.transaction_hash).await?;
        if tx.from != user {
            return Ok(Decision::Reject(RejectReason::SenderMismatch));
        }
        // The recipient may be the stake manager or a vault proxy in front of it
        let Some(to) = tx.to else {
            return Ok(Decision::Reject(RejectReason::RecipientMismatch));
        };

        Ok(Decision::Accept(Interaction::new(
            log.transaction_hash,
            log.block_number,
            tx.from,
            to,
            tx.input,
            InteractionDetail::Stake {
                amount,
                lock_period,
            },
        )))
    }
}

/// Method-id based stake rule, for vaults without a decodable event.
pub struct StakeMethodRule {
    vault: Address,
    selector: [u8; 4],
    min_stake: U256,
}

impl StakeMethodRule {
    pub fn new(vault: Address, selector: [u8; 4], min_stake: U256) -> Self {
        Self {
            vault,
            selector,
            min_stake,
        }
    }
}

#[async_trait]
impl MatchRule for StakeMethodRule {
    fn kind(&self) -> &'static str {
        "stake-method"
    }

    fn log_filter(&self, _user: Address) -> LogFilter {
        LogFilter::new(self.vault)
    }

    async fn evaluate(
        &self,
        chain: &dyn ChainReader,
        user: Address,
        log: &Log,
    ) -> Result<Decision> {
        let tx = chain.get_transaction(log.transaction_hash).await?;
        if tx.from != user {
            return Ok(Decision::Reject(RejectReason::SenderMismatch));
        }
        if tx.to != Some(self.vault) {
            return Ok(Decision::Reject(RejectReason::RecipientMismatch));
        }
        if !tx.input.starts_with(&self.selector) {
            return Ok(Decision::Reject(RejectReason::MethodMismatch));
        }

        // stake(uint256 amount, uint256 lockPeriod)
        let args = &tx.input[4..];
        let (Some(amount), Some(lock_period)) = (read_word(args, 0), read_word(args, 1)) else {
            return Ok(Decision::Reject(RejectReason::Malformed(
                "stake call data too short".to_string(),
            )));
        };
        if let Some(reason) = threshold_check(amount, self.min_stake) {
            debug!("Skipping stake in tx {:?}: {}", log.transaction_hash, reason);
            return Ok(Decision::Reject(reason));
        }

        Ok(Decision::Accept(Interaction::new(
            log.transaction_hash,
            log.block_number,
            tx.from,
            self.vault,
            tx.input,
            InteractionDetail::Stake {
                amount,
                lock_period,
            },
        )))
    }
}
