//! NFT mint rule
//!
//! A mint is an ERC721 Transfer event emitted by the tracked collection
//! with `from` = zero address and `to` = the user. The log filter already
//! pins both indexed addresses, so no transaction fetch is needed.

use crate::records::{Interaction, InteractionDetail};
use crate::rpc::ChainReader;
use crate::rule::{Decision, MatchRule, RejectReason};
use crate::types::{address_to_topic, topic_to_address, Log, LogFilter};
use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: B256 = B256::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d,
    0xaa, 0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23,
    0xb3, 0xef,
]);

/// Rule matching mints of one NFT collection to the user.
pub struct NftMintRule {
    contract: Address,
}

impl NftMintRule {
    pub fn new(contract: Address) -> Self {
        Self { contract }
    }
}

#[async_trait]
impl MatchRule for NftMintRule {
    fn kind(&self) -> &'static str {
        "nft-mint"
    }

    fn log_filter(&self, user: Address) -> LogFilter {
        LogFilter::new(self.contract).with_topics(vec![
            Some(TRANSFER_TOPIC),
            Some(address_to_topic(Address::ZERO)),
            Some(address_to_topic(user)),
        ])
    }

    async fn evaluate(
        &self,
        _chain: &dyn ChainReader,
        user: Address,
        log: &Log,
    ) -> Result<Decision> {
        if log.address != self.contract || log.topic(0) != Some(TRANSFER_TOPIC) {
            return Ok(Decision::Reject(RejectReason::Malformed(
                "not a Transfer of the tracked collection".to_string(),
            )));
        }
        let (Some(from), Some(to), Some(token)) = (log.topic(1), log.topic(2), log.topic(3))
        else {
            // ERC20 transfers share the signature but index only two topics
            return Ok(Decision::Reject(RejectReason::Malformed(
                "Transfer log without indexed token id".to_string(),
            )));
        };
        if topic_to_address(from) != Address::ZERO {
            return Ok(Decision::Reject(RejectReason::SenderMismatch));
        }
        if topic_to_address(to) != user {
            return Ok(Decision::Reject(RejectReason::RecipientMismatch));
        }

        let token_id = U256::from_be_slice(token.as_slice());
        Ok(Decision::Accept(Interaction::new(
            log.transaction_hash,
            log.block_number,
            Address::ZERO,
            user,
            Vec::new(),
            InteractionDetail::Mint { token_id },
        )))
    }

    fn early_exit(&self) -> bool {
        // Collect every token the user minted
        false
    }
}
