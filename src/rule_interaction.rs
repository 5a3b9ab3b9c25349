//! Generic contract interaction rule
//!
//! The user must have sent a transaction to the tracked contract, which may
//! show up as either its proxy or its implementation address. Transactions
//! are discovered through the logs the proxy emitted, so a call that emits
//! no log is never seen.

use crate::records::{Interaction, InteractionDetail};
use crate::rpc::ChainReader;
use crate::rule::{Decision, MatchRule, RejectReason};
use crate::types::{Log, LogFilter};
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

/// Rule matching any transaction from the user to a proxy/implementation pair.
pub struct ContractInteractionRule {
    proxy: Address,
    implementation: Option<Address>,
}

impl ContractInteractionRule {
    pub fn new(proxy: Address, implementation: Option<Address>) -> Self {
        Self {
            proxy,
            implementation,
        }
    }

    fn is_target(&self, to: Address) -> bool {
        to == self.proxy || Some(to) == self.implementation
    }
}

#[async_trait]
impl MatchRule for ContractInteractionRule {
    fn kind(&self) -> &'static str {
        "contract-interaction"
    }

    fn log_filter(&self, _user: Address) -> LogFilter {
        LogFilter::new(self.proxy)
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
        match tx.to {
            Some(to) if self.is_target(to) => Ok(Decision::Accept(Interaction::new(
                log.transaction_hash,
                log.block_number,
                tx.from,
                to,
                tx.input,
                InteractionDetail::None,
            ))),
            _ => Ok(Decision::Reject(RejectReason::RecipientMismatch)),
        }
    }
}
