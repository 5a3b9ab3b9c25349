//! Configuration and address list loading
//!
//! The quest configuration is a JSON file. Every key is optional; missing
//! keys fall back to the Status Network Sepolia deployment.
//!
//! ```json
//! {
//!   "rpc_url": "https://public.sepolia.rpc.status.network",
//!   "max_blocks_per_query": 2000,
//!   "retry": { "max_retries": 3, "delay_ms": 2000 },
//!   "cache": { "capacity": 10000, "ttl_secs": 3600 },
//!   "checkers": [
//!     { "id": "nft-mint", "window": 20000,
//!       "rule": { "kind": "nft-mint", "contract": "0xf4432bAbc32afAcCeaf76afC9a1B2a9D3D55BAa8" } }
//!   ]
//! }
//! ```
//!
//! Address lists for batch checks hold one address per line.

use crate::checker::{parse_user_address, CheckerSettings};
use crate::retry::RetryOpts;
use crate::rule::{default_min_stake, MatchRule};
use crate::rule_interaction::ContractInteractionRule;
use crate::rule_nft::NftMintRule;
use crate::rule_stake::{StakeEventRule, StakeMethodRule};
use alloy_primitives::{address, Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "https://public.sepolia.rpc.status.network";
pub const DEFAULT_CHAIN_ID: u64 = 1_660_990_954;
/// First block of the quest campaign
pub const DEFAULT_START_BLOCK: u64 = 11_713_689;
pub const DEFAULT_MAX_BLOCKS_PER_QUERY: u64 = 2_000;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub start_block: u64,
    pub max_blocks_per_query: u64,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub checkers: Vec<CheckerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries kept by the in-memory store
    pub capacity: usize,
    /// Cached scans older than this are redone from scratch
    pub ttl_secs: Option<u64>,
}

/// One quest checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub id: String,
    /// Blocks searched back from the head on a first scan
    pub window: u64,
    /// Overrides the global start block
    #[serde(default)]
    pub start_block: Option<u64>,
    pub rule: RuleConfig,
}

/// Rule of a checker, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleConfig {
    NftMint {
        contract: Address,
    },
    StakeEvent {
        stake_manager: Address,
        #[serde(default = "default_min_stake_string")]
        min_stake: String,
    },
    StakeMethod {
        vault: Address,
        #[serde(default = "default_selector_string")]
        selector: String,
        #[serde(default = "default_min_stake_string")]
        min_stake: String,
    },
    ContractInteraction {
        proxy: Address,
        #[serde(default)]
        implementation: Option<Address>,
    },
}

fn default_min_stake_string() -> String {
    default_min_stake().to_string()
}

fn default_selector_string() -> String {
    "0x7b0472f0".to_string()
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            start_block: DEFAULT_START_BLOCK,
            max_blocks_per_query: DEFAULT_MAX_BLOCKS_PER_QUERY,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            checkers: default_checkers(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 2_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: crate::cache::DEFAULT_CAPACITY,
            ttl_secs: None,
        }
    }
}

/// The three quests of the Status Network Sepolia campaign.
pub fn default_checkers() -> Vec<CheckerConfig> {
    vec![
        CheckerConfig {
            id: "nft-mint".to_string(),
            window: 20_000,
            start_block: None,
            rule: RuleConfig::NftMint {
                contract: address!("f4432bAbc32afAcCeaf76afC9a1B2a9D3D55BAa8"),
            },
        },
        CheckerConfig {
            id: "vault-stake".to_string(),
            window: 10_000,
            start_block: None,
            rule: RuleConfig::StakeMethod {
                vault: address!("c13Bf1d5986D8831116E36d11b4d2AE859258C7D"),
                selector: default_selector_string(),
                min_stake: default_min_stake_string(),
            },
        },
        CheckerConfig {
            id: "contract-interaction".to_string(),
            window: 15_000,
            start_block: None,
            rule: RuleConfig::ContractInteraction {
                proxy: address!("deFa3b4431C0570225460B127d16594FE3D4Dfe6"),
                implementation: Some(address!("908b6e3aFD83633bbFB71Fb73a2bEc7972327FDd")),
            },
        },
    ]
}

impl QuestConfig {
    /// Check the configuration for values that would make checkers misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.max_blocks_per_query == 0 {
            anyhow::bail!("max_blocks_per_query must be greater than zero");
        }
        let mut ids = HashSet::new();
        for checker in &self.checkers {
            if !ids.insert(checker.id.as_str()) {
                anyhow::bail!("Duplicate checker id: {}", checker.id);
            }
            if checker.window == 0 {
                anyhow::bail!("Checker {} has a zero window", checker.id);
            }
            checker
                .rule
                .build()
                .with_context(|| format!("Invalid rule for checker {}", checker.id))?;
        }
        Ok(())
    }

    pub fn retry_opts(&self) -> RetryOpts {
        RetryOpts {
            max_retries: self.retry.max_retries,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    /// Scan settings of one checker.
    pub fn settings_for(&self, checker: &CheckerConfig) -> CheckerSettings {
        CheckerSettings {
            start_block: checker.start_block.unwrap_or(self.start_block),
            window: checker.window,
            max_blocks_per_query: self.max_blocks_per_query,
            ttl_secs: self.cache.ttl_secs,
        }
    }
}

impl RuleConfig {
    /// Build the match rule this entry describes.
    pub fn build(&self) -> Result<Box<dyn MatchRule>> {
        let rule: Box<dyn MatchRule> = match self {
            RuleConfig::NftMint { contract } => Box::new(NftMintRule::new(*contract)),
            RuleConfig::StakeEvent {
                stake_manager,
                min_stake,
            } => Box::new(StakeEventRule::new(
                *stake_manager,
                parse_min_stake(min_stake)?,
            )),
            RuleConfig::StakeMethod {
                vault,
                selector,
                min_stake,
            } => Box::new(StakeMethodRule::new(
                *vault,
                parse_selector(selector)?,
                parse_min_stake(min_stake)?,
            )),
            RuleConfig::ContractInteraction {
                proxy,
                implementation,
            } => Box::new(ContractInteractionRule::new(*proxy, *implementation)),
        };
        Ok(rule)
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<QuestConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config: QuestConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Parse a base-unit amount, decimal or `0x` hex.
pub fn parse_min_stake(s: &str) -> Result<U256> {
    s.trim()
        .parse::<U256>()
        .map_err(|e| anyhow::anyhow!("Invalid min_stake {:?}: {}", s, e))
}

/// Parse a 4-byte method selector such as `0x7b0472f0`.
pub fn parse_selector(s: &str) -> Result<[u8; 4]> {
    let hex_part = s.trim().strip_prefix("0x").unwrap_or(s.trim());
    let bytes = hex::decode(hex_part).with_context(|| format!("Invalid hex selector: {}", s))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("Selector must be 4 bytes, got {} bytes", b.len()))
}

/// Load an address list from a file.
///
/// Each line should contain one Ethereum address in hex format (with or without 0x prefix).
/// Empty lines and lines starting with '#' are ignored.
pub fn load_watchlist(path: &Path) -> Result<Vec<Address>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read address list: {:?}", path))?;

    let mut addresses = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let addr = parse_user_address(line)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Invalid address on line {}: {}", line_num + 1, line))?;
        addresses.push(addr);
    }

    if addresses.is_empty() {
        anyhow::bail!("Address list is empty (no valid addresses found)");
    }

    Ok(addresses)
}
