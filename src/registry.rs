//! Configured quest checkers and their shared cache
//!
//! `QuestBook` builds every checker of a `QuestConfig` over one chain reader
//! and one scan store, and owns cache invalidation across them.

use crate::checker::Checker;
use crate::config::QuestConfig;
use crate::error::VerifyError;
use crate::retry::{self, RetryOpts};
use crate::rpc::ChainReader;
use crate::store::ScanStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// All quest checkers of one deployment.
pub struct QuestBook {
    checkers: Vec<Checker>,
    retry: RetryOpts,
}

impl QuestBook {
    /// Build the checkers described by `config`.
    pub fn from_config(
        config: &QuestConfig,
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn ScanStore>,
    ) -> Result<Self> {
        config.validate()?;
        let mut checkers = Vec::with_capacity(config.checkers.len());
        for entry in &config.checkers {
            let rule = entry
                .rule
                .build()
                .with_context(|| format!("Failed to build checker {}", entry.id))?;
            checkers.push(Checker::new(
                entry.id.clone(),
                rule,
                config.settings_for(entry),
                chain.clone(),
                store.clone(),
            ));
        }
        info!("Loaded {} quest checkers", checkers.len());
        Ok(Self {
            checkers,
            retry: config.retry_opts(),
        })
    }

    /// Build the checkers after confirming `chain` serves the configured chain.
    pub async fn connect(
        config: &QuestConfig,
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn ScanStore>,
    ) -> Result<Self> {
        ensure_chain(chain.as_ref(), config.chain_id).await?;
        Self::from_config(config, chain, store)
    }

    /// Look up a checker by id.
    pub fn checker(&self, id: &str) -> Result<&Checker, VerifyError> {
        self.checkers
            .iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| VerifyError::UnknownChecker(id.to_string()))
    }

    pub fn checkers(&self) -> &[Checker] {
        &self.checkers
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.checkers.iter().map(|c| c.id())
    }

    pub fn retry_opts(&self) -> RetryOpts {
        self.retry
    }

    /// Clear one checker's cache, for one address or all of them.
    pub fn clear(&self, id: &str, address: Option<&str>) -> Result<usize, VerifyError> {
        self.checker(id)?.clear_cache(address)
    }

    /// Clear every checker's cache, for one address or all of them.
    pub fn clear_all(&self, address: Option<&str>) -> Result<usize, VerifyError> {
        let mut removed = 0;
        for checker in &self.checkers {
            removed += checker.clear_cache(address)?;
        }
        info!("Cleared {} cache entries across all checkers", removed);
        Ok(removed)
    }

    /// React to the connected wallet changing.
    ///
    /// Any change of address, including connect and disconnect, drops every
    /// cached scan. Returns whether the caches were cleared.
    pub fn on_wallet_change(
        &self,
        previous: Option<&str>,
        next: Option<&str>,
    ) -> Result<bool, VerifyError> {
        let normalize = |a: Option<&str>| a.map(|s| s.trim().to_lowercase());
        if normalize(previous) == normalize(next) {
            return Ok(false);
        }
        info!(
            "Wallet changed from {:?} to {:?}, clearing quest caches",
            previous, next
        );
        self.clear_all(None)?;
        Ok(true)
    }

    /// Verify a quest with the configured retry policy.
    pub async fn verify_with_retry(&self, id: &str, address: &str) -> bool {
        self.verify_with_opts(id, address, self.retry).await
    }

    /// Verify a quest with explicit retry options.
    pub async fn verify_with_opts(&self, id: &str, address: &str, opts: RetryOpts) -> bool {
        match self.checker(id) {
            Ok(checker) => retry::verify_with_retry(checker, address, opts).await,
            Err(e) => {
                warn!("Cannot verify {}: {}", address, e);
                false
            }
        }
    }
}

/// Fail unless the reader reports chain id `expected`.
pub async fn ensure_chain(chain: &dyn ChainReader, expected: u64) -> Result<()> {
    let actual = chain
        .chain_id()
        .await
        .context("Failed to query chain id")?;
    if actual != expected {
        anyhow::bail!("RPC endpoint is on chain {}, expected {}", actual, expected);
    }
    info!("Connected to chain {}", actual);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryScanStore;
    use crate::config::{CheckerConfig, RetryConfig, RuleConfig};
    use crate::testing::FakeChain;
    use crate::types::{Log, Transaction};
    use alloy_primitives::{address, Address, B256};

    const USER: &str = "0xb248A284756a52C7eC5Fb119648747128c1eC28b";
    const OTHER: &str = "0x0000000000000000000000000000000000000abc";
    const HEAD: u64 = 11_800_000;

    fn proxy() -> Address {
        address!("deFa3b4431C0570225460B127d16594FE3D4Dfe6")
    }

    fn book(chain: &Arc<FakeChain>, store: &Arc<MemoryScanStore>) -> QuestBook {
        let config = QuestConfig {
            retry: RetryConfig {
                max_retries: 2,
                delay_ms: 1,
            },
            ..QuestConfig::default()
        };
        QuestBook::from_config(
            &config,
            chain.clone() as Arc<dyn ChainReader>,
            store.clone() as Arc<dyn ScanStore>,
        )
        .unwrap()
    }

    fn seed_interaction(chain: &FakeChain) {
        let hash = B256::repeat_byte(0x51);
        chain.add_log(Log {
            address: proxy(),
            topics: Vec::new(),
            data: Vec::new(),
            block_number: HEAD - 3,
            transaction_hash: hash,
            log_index: 0,
        });
        chain.add_transaction(Transaction {
            hash,
            from: address!("b248A284756a52C7eC5Fb119648747128c1eC28b"),
            to: Some(proxy()),
            input: Vec::new(),
            block_number: Some(HEAD - 3),
        });
    }

    #[tokio::test]
    async fn test_default_book_has_all_quests() {
        let chain = Arc::new(FakeChain::new(HEAD));
        let store = Arc::new(MemoryScanStore::default());
        let book = book(&chain, &store);

        let ids: Vec<&str> = book.ids().collect();
        assert_eq!(ids, vec!["nft-mint", "vault-stake", "contract-interaction"]);
        assert_eq!(book.checker("vault-stake").unwrap().kind(), "stake-method");
        assert!(matches!(
            book.checker("bridge"),
            Err(VerifyError::UnknownChecker(_))
        ));
        assert!(!book.verify_with_retry("bridge", USER).await);
    }

    #[tokio::test]
    async fn test_verify_with_configured_retry() {
        let chain = Arc::new(FakeChain::new(HEAD));
        let store = Arc::new(MemoryScanStore::default());
        seed_interaction(&chain);
        let book = book(&chain, &store);

        assert!(book.verify_with_retry("contract-interaction", USER).await);
        assert!(!book.verify_with_retry("nft-mint", USER).await);
    }

    #[tokio::test]
    async fn test_clear_one_and_all() {
        let chain = Arc::new(FakeChain::new(HEAD));
        let store = Arc::new(MemoryScanStore::default());
        let book = book(&chain, &store);
        for checker in book.checkers() {
            checker.check_interactions(USER).await.unwrap();
            checker.check_interactions(OTHER).await.unwrap();
        }
        assert_eq!(store.len(), 6);

        assert_eq!(book.clear("nft-mint", Some(USER)).unwrap(), 1);
        assert_eq!(store.len(), 5);
        assert_eq!(book.clear_all(Some(OTHER)).unwrap(), 3);
        assert_eq!(store.len(), 2);
        assert_eq!(book.clear_all(None).unwrap(), 2);
        assert!(store.is_empty());
        assert!(book.clear("bridge", None).is_err());
    }

    #[tokio::test]
    async fn test_wallet_change_clears_caches() {
        let chain = Arc::new(FakeChain::new(HEAD));
        let store = Arc::new(MemoryScanStore::default());
        let book = book(&chain, &store);
        book.checker("nft-mint")
            .unwrap()
            .check_interactions(USER)
            .await
            .unwrap();

        let lower = USER.to_lowercase();
        assert!(!book.on_wallet_change(Some(USER), Some(&lower)).unwrap());
        assert_eq!(store.len(), 1);

        assert!(book.on_wallet_change(Some(USER), Some(OTHER)).unwrap());
        assert!(store.is_empty());
        assert!(book.on_wallet_change(None, Some(USER)).unwrap());
        assert!(!book.on_wallet_change(None, None).unwrap());
    }

    #[tokio::test]
    async fn test_connect_checks_chain_id() {
        let chain = Arc::new(FakeChain::new(HEAD));
        let store = Arc::new(MemoryScanStore::default());
        let config = QuestConfig::default();
        let book = QuestBook::connect(
            &config,
            chain.clone() as Arc<dyn ChainReader>,
            store.clone() as Arc<dyn ScanStore>,
        )
        .await
        .unwrap();
        assert_eq!(book.checkers().len(), 3);

        chain.set_chain_id(11_155_111);
        let err = QuestBook::connect(
            &config,
            chain as Arc<dyn ChainReader>,
            store as Arc<dyn ScanStore>,
        )
        .await
        .err()
        .unwrap();
        assert!(err
            .to_string()
            .contains("chain 11155111, expected 1660990954"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = QuestConfig::default();
        config.checkers.push(CheckerConfig {
            id: "nft-mint".to_string(),
            window: 10,
            start_block: None,
            rule: RuleConfig::NftMint {
                contract: Address::ZERO,
            },
        });
        let result = QuestBook::from_config(
            &config,
            Arc::new(FakeChain::new(HEAD)) as Arc<dyn ChainReader>,
            Arc::new(MemoryScanStore::default()) as Arc<dyn ScanStore>,
        );
        assert!(result.is_err());
    }
}
