//! In-memory chain used by the unit tests.

use crate::config::DEFAULT_CHAIN_ID;
use crate::rpc::ChainReader;
use crate::rule_stake::STAKE_SELECTOR;
use crate::types::{Log, LogFilter, Transaction};
use alloy_primitives::{B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// ChainReader backed by vectors and maps, with call counters and
/// switchable failures.
#[derive(Default)]
pub struct FakeChain {
    chain_id: AtomicU64,
    height: AtomicU64,
    logs: Mutex<Vec<Log>>,
    transactions: Mutex<HashMap<B256, Transaction>>,
    failing_transactions: Mutex<HashSet<B256>>,
    fail_height: AtomicBool,
    fail_logs: AtomicBool,
    log_delay_ms: AtomicU64,
    height_calls: AtomicUsize,
    log_calls: AtomicUsize,
    transaction_calls: AtomicUsize,
    filters: Mutex<Vec<LogFilter>>,
}

impl FakeChain {
    pub fn new(height: u64) -> Self {
        let chain = Self::default();
        chain.set_chain_id(DEFAULT_CHAIN_ID);
        chain.set_height(height);
        chain
    }

    pub fn set_chain_id(&self, id: u64) {
        self.chain_id.store(id, Ordering::SeqCst);
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn add_log(&self, log: Log) {
        self.logs.lock().push(log);
    }

    pub fn add_transaction(&self, tx: Transaction) {
        self.transactions.lock().insert(tx.hash, tx);
    }

    /// Make `get_transaction` fail for one hash.
    pub fn fail_transaction(&self, hash: B256) {
        self.failing_transactions.lock().insert(hash);
    }

    /// Let `get_transaction` succeed again for `hash`.
    pub fn recover_transaction(&self, hash: B256) {
        self.failing_transactions.lock().remove(&hash);
    }

    pub fn set_fail_height(&self, fail: bool) {
        self.fail_height.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_logs(&self, fail: bool) {
        self.fail_logs.store(fail, Ordering::SeqCst);
    }

    /// Make every `get_logs` call wait before answering.
    pub fn set_log_delay(&self, delay: Duration) {
        self.log_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn height_calls(&self) -> usize {
        self.height_calls.load(Ordering::SeqCst)
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub fn transaction_calls(&self) -> usize {
        self.transaction_calls.load(Ordering::SeqCst)
    }

    /// Every filter passed to `get_logs`, in call order.
    pub fn filters(&self) -> Vec<LogFilter> {
        self.filters.lock().clone()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn block_number(&self) -> Result<u64> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_height.load(Ordering::SeqCst) {
            anyhow::bail!("eth_blockNumber: connection refused");
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().push(filter.clone());
        let delay = self.log_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_logs.load(Ordering::SeqCst) {
            anyhow::bail!("eth_getLogs: rate limited");
        }
        let mut logs: Vec<Log> = self
            .logs
            .lock()
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn get_transaction(&self, hash: B256) -> Result<Transaction> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_transactions.lock().contains(&hash) {
            anyhow::bail!("eth_getTransactionByHash: upstream timeout");
        }
        self.transactions
            .lock()
            .get(&hash)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transaction 0x{:x} not found", hash))
    }
}

/// ABI-encode `stake(uint256 amount, uint256 lockPeriod)` call data.
pub fn stake_calldata(amount: U256, lock_period: U256) -> Vec<u8> {
    let mut input = STAKE_SELECTOR.to_vec();
    input.extend_from_slice(&amount.to_be_bytes::<32>());
    input.extend_from_slice(&lock_period.to_be_bytes::<32>());
    input
}
