//! Log-then-verify checker engine
//!
//! One `Checker` per quest. A check for an address:
//! 1. loads the cached `ScanState` (a stale entry counts as absent),
//! 2. plans the block range (full window, or only blocks after the last scan),
//! 3. pages through `eth_getLogs` for the rule's filter,
//! 4. lets the rule judge each log, one at a time, skipping candidates that fail,
//! 5. stores the merged state and returns the matches.
//!
//! Height and log-list failures abort the check and nothing is cached.
//! Concurrent checks of the same address run one after another.

use crate::error::{Verdict, VerifyError};
use crate::planner::plan_range;
use crate::records::{unix_now, Interaction, ScanState};
use crate::rpc::ChainReader;
use crate::rule::{Decision, MatchRule};
use crate::store::ScanStore;
use crate::types::{Log, LogFilter, Transaction};
use alloy_primitives::{Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scan parameters of one checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerSettings {
    /// Earliest block any scan may start from
    pub start_block: u64,
    /// How far back a first scan looks from the head
    pub window: u64,
    /// Largest block span per `eth_getLogs` request
    pub max_blocks_per_query: u64,
    /// Cached state older than this is rescanned from scratch
    pub ttl_secs: Option<u64>,
}

/// A quest checker: a match rule plus caching and range planning.
pub struct Checker {
    id: String,
    rule: Box<dyn MatchRule>,
    settings: CheckerSettings,
    chain: Arc<dyn ChainReader>,
    store: Arc<dyn ScanStore>,
    inflight: Gates,
}

type Gates = Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>;

/// A caller's claim on the per-address scan gate.
///
/// Dropping the slot removes the gate from the map once no other caller
/// holds it, also when the owning future is cancelled mid-scan.
struct InflightSlot<'a> {
    gates: &'a Gates,
    addr: Address,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn enter(gates: &'a Gates, addr: Address) -> Self {
        let gate = gates.lock().entry(addr).or_default().clone();
        Self { gates, addr, gate }
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock();
        // Only the map and this slot still hold the gate: nobody is waiting
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(&self.addr);
        }
    }
}

impl Checker {
    /// Create a checker over an injected chain reader and store.
    pub fn new(
        id: impl Into<String>,
        rule: Box<dyn MatchRule>,
        settings: CheckerSettings,
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn ScanStore>,
    ) -> Self {
        Self {
            id: id.into(),
            rule,
            settings,
            chain,
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Checker id, also the cache namespace.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind of the underlying rule.
    pub fn kind(&self) -> &'static str {
        self.rule.kind()
    }

    pub fn settings(&self) -> &CheckerSettings {
        &self.settings
    }

    /// All interactions found for `address`.
    pub async fn check_interactions(&self, address: &str) -> Result<Vec<Interaction>, VerifyError> {
        Ok(self.load(address).await?.matches)
    }

    /// Tri-state outcome of a check.
    pub async fn verdict(&self, address: &str) -> Verdict {
        match self.check_interactions(address).await {
            Ok(matches) if !matches.is_empty() => Verdict::Found,
            Ok(_) => Verdict::NotFound,
            Err(e) => Verdict::Unknown(e.to_string()),
        }
    }

    /// Whether the quest is complete. Any error reads as `false`.
    pub async fn has_interacted(&self, address: &str) -> bool {
        match self.verdict(address).await {
            Verdict::Found => true,
            Verdict::NotFound => false,
            Verdict::Unknown(reason) => {
                warn!("[{}] Check failed for {}: {}", self.id, address, reason);
                false
            }
        }
    }

    /// Most recent interaction by block number. Any error reads as `None`.
    pub async fn get_latest(&self, address: &str) -> Option<Interaction> {
        match self.load(address).await {
            Ok(state) => state.latest().cloned(),
            Err(e) => {
                warn!("[{}] Failed to get latest interaction for {}: {}", self.id, address, e);
                None
            }
        }
    }

    /// Stored scan state for `address`, without scanning.
    pub fn scan_state(&self, address: &str) -> Result<Option<ScanState>, VerifyError> {
        let addr = parse_user_address(address)?;
        self.store.get(&self.id, addr).map_err(VerifyError::Store)
    }

    /// Drop the cached state of one address, or of every address.
    ///
    /// Returns the number of entries removed.
    pub fn clear_cache(&self, address: Option<&str>) -> Result<usize, VerifyError> {
        match address {
            Some(address) => {
                let addr = parse_user_address(address)?;
                let removed = self
                    .store
                    .remove(&self.id, addr)
                    .map_err(VerifyError::Store)?;
                info!("[{}] Cleared cache for 0x{:x}", self.id, addr);
                Ok(usize::from(removed))
            }
            None => {
                let removed = self
                    .store
                    .clear_checker(&self.id)
                    .map_err(VerifyError::Store)?;
                info!("[{}] Cleared {} cache entries", self.id, removed);
                Ok(removed)
            }
        }
    }

    async fn load(&self, address: &str) -> Result<ScanState, VerifyError> {
        let addr = parse_user_address(address)?;
        self.scan_serialized(addr).await
    }

    /// Run `scan` with at most one scan per address at a time.
    async fn scan_serialized(&self, addr: Address) -> Result<ScanState, VerifyError> {
        let slot = InflightSlot::enter(&self.inflight, addr);
        let _turn = slot.gate.lock().await;
        self.scan(addr).await
    }

    async fn scan(&self, addr: Address) -> Result<ScanState, VerifyError> {
        let cached = self
            .store
            .get(&self.id, addr)
            .map_err(VerifyError::Store)?
            .filter(|state| {
                let stale = state.is_stale(self.settings.ttl_secs, unix_now());
                if stale {
                    debug!("[{}] Cached state for 0x{:x} is stale", self.id, addr);
                }
                !stale
            });

        if let Some(state) = &cached {
            if self.rule.early_exit() && !state.matches.is_empty() {
                debug!("[{}] Using cached match for 0x{:x}", self.id, addr);
                return Ok(state.clone());
            }
        }

        let current = self
            .chain
            .block_number()
            .await
            .map_err(VerifyError::TransientUnavailable)?;

        let mut state = cached.unwrap_or_else(|| ScanState::new(format!("0x{:x}", addr)));
        let Some(range) = plan_range(
            self.settings.start_block,
            self.settings.window,
            current,
            state.last_scanned_block,
        ) else {
            debug!("[{}] No new blocks for 0x{:x} (head {})", self.id, addr, current);
            return Ok(state);
        };

        info!(
            "[{}] Checking 0x{:x}: blocks {} to {}",
            self.id, addr, range.from, range.to
        );

        let chain = MemoChain::new(self.chain.as_ref());
        let base = self.rule.log_filter(addr);
        let mut found = 0usize;
        // Lowest block holding a candidate that could not be evaluated
        let mut retry_from: Option<u64> = None;

        'pages: for page in range.pages(self.settings.max_blocks_per_query) {
            let filter = base.clone().with_range(page.from, page.to);
            let logs = chain
                .get_logs(&filter)
                .await
                .map_err(VerifyError::TransientUnavailable)?;
            debug!(
                "[{}] {} candidate logs in blocks {} to {}",
                self.id,
                logs.len(),
                page.from,
                page.to
            );

            for log in &logs {
                if state.contains(&log.transaction_hash) {
                    continue;
                }
                match self.rule.evaluate(&chain, addr, log).await {
                    Ok(Decision::Accept(interaction)) => {
                        if state.absorb(interaction) {
                            found += 1;
                        }
                        if self.rule.early_exit() {
                            info!(
                                "[{}] Found match for 0x{:x} in tx {:?}, stopping search",
                                self.id, addr, log.transaction_hash
                            );
                            break 'pages;
                        }
                    }
                    Ok(Decision::Reject(reason)) => {
                        debug!(
                            "[{}] Rejected log {} of tx {:?}: {}",
                            self.id, log.log_index, log.transaction_hash, reason
                        );
                    }
                    Err(e) => {
                        warn!(
                            "[{}] Skipping log {} of tx {:?}: {:#}",
                            self.id, log.log_index, log.transaction_hash, e
                        );
                        retry_from = Some(retry_from.map_or(log.block_number, |b| {
                            b.min(log.block_number)
                        }));
                    }
                }
            }
        }

        match retry_from {
            None => state.advance(range.to),
            Some(block) => {
                debug!(
                    "[{}] Holding scan point for 0x{:x} before block {}",
                    self.id, addr, block
                );
                if let Some(before) = block.checked_sub(1) {
                    state.advance(before);
                }
            }
        }
        state.touch();
        self.store
            .put(&self.id, addr, &state)
            .map_err(VerifyError::Store)?;

        info!(
            "[{}] 0x{:x}: {} new, {} total matches",
            self.id,
            addr,
            found,
            state.matches.len()
        );
        Ok(state)
    }
}

/// Parse a user-supplied address (with or without `0x`, any case).
pub fn parse_user_address(address: &str) -> Result<Address, VerifyError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(VerifyError::InvalidInput("address is required".to_string()));
    }
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex_part.len() != 40 {
        return Err(VerifyError::InvalidInput(format!(
            "address must be 40 hex chars, got {}",
            hex_part.len()
        )));
    }
    let bytes = hex::decode(hex_part)
        .map_err(|e| VerifyError::InvalidInput(format!("invalid hex address {}: {}", address, e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Chain reader that remembers transactions fetched during one scan.
///
/// Several logs of one transaction cost a single lookup. Failures are not
/// remembered.
struct MemoChain<'a> {
    inner: &'a dyn ChainReader,
    transactions: Mutex<HashMap<B256, Transaction>>,
}

impl<'a> MemoChain<'a> {
    fn new(inner: &'a dyn ChainReader) -> Self {
        Self {
            inner,
            transactions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChainReader for MemoChain<'_> {
    async fn chain_id(&self) -> Result<u64> {
        self.inner.chain_id().await
    }

    async fn block_number(&self) -> Result<u64> {
        self.inner.block_number().await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.inner.get_logs(filter).await
    }

    async fn get_transaction(&self, hash: B256) -> Result<Transaction> {
        let known = self.transactions.lock().get(&hash).cloned();
        if let Some(tx) = known {
            return Ok(tx);
        }
        let tx = self.inner.get_transaction(hash).await?;
        self.transactions.lock().insert(hash, tx.clone());
        Ok(tx)
    }
}
