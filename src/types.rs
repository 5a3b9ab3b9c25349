//! Ethereum JSON-RPC types
//!
//! Type definitions for the logs and transactions returned from
//! `eth_getLogs` / `eth_getTransactionByHash`, and the log filter
//! sent with `eth_getLogs`.

use crate::checker::parse_user_address;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

/// Log entry returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Log {
    /// Address of the contract that emitted the log
    #[serde(rename = "address", deserialize_with = "deserialize_hex_address")]
    pub address: Address,

    /// Indexed topics (topic0 = event signature, topics[1..] = indexed params)
    #[serde(rename = "topics", default, deserialize_with = "deserialize_hex_b256_vec")]
    pub topics: Vec<B256>,

    /// Non-indexed event data (hex string)
    #[serde(rename = "data", deserialize_with = "deserialize_hex_bytes")]
    pub data: Vec<u8>,

    /// Block the log was included in
    #[serde(rename = "blockNumber", deserialize_with = "deserialize_hex_u64")]
    pub block_number: u64,

    /// Hash of the transaction that emitted the log
    #[serde(rename = "transactionHash", deserialize_with = "deserialize_hex_b256")]
    pub transaction_hash: B256,

    /// Position of the log within the block
    #[serde(rename = "logIndex", deserialize_with = "deserialize_hex_u64")]
    pub log_index: u64,
}

impl Log {
    /// Indexed topic at `index`, if present.
    pub fn topic(&self, index: usize) -> Option<B256> {
        self.topics.get(index).copied()
    }
}

/// Ethereum transaction as returned by `eth_getTransactionByHash`.
///
/// Only the fields the quest rules look at are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transaction {
    /// Transaction hash (hex string in JSON)
    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Sender address (hex string in JSON)
    #[serde(rename = "from", deserialize_with = "deserialize_hex_address")]
    pub from: Address,

    /// Recipient address (None for contract creation, hex string in JSON)
    #[serde(rename = "to", default, deserialize_with = "deserialize_hex_address_opt")]
    pub to: Option<Address>,

    /// Transaction input data (hex string in JSON, "0x" for simple transfers)
    #[serde(rename = "input", deserialize_with = "deserialize_hex_bytes")]
    pub input: Vec<u8>,

    /// Block number (None while pending)
    #[serde(rename = "blockNumber", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub block_number: Option<u64>,
}

/// Filter passed to `eth_getLogs`.
///
/// `topics[i] == None` is a wildcard for position `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<Option<B256>>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    /// Filter on every log of `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            topics: Vec::new(),
            from_block: 0,
            to_block: 0,
        }
    }

    /// Restrict to the given topic positions.
    pub fn with_topics(mut self, topics: Vec<Option<B256>>) -> Self {
        self.topics = topics;
        self
    }

    /// Set the inclusive block range.
    pub fn with_range(mut self, from_block: u64, to_block: u64) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    /// JSON-RPC filter object.
    pub fn to_params(&self) -> Value {
        let mut filter = json!({
            "address": format!("0x{:x}", self.address),
            "fromBlock": format!("0x{:x}", self.from_block),
            "toBlock": format!("0x{:x}", self.to_block),
        });
        if !self.topics.is_empty() {
            let topics: Vec<Value> = self
                .topics
                .iter()
                .map(|t| match t {
                    Some(topic) => Value::String(format!("0x{:x}", topic)),
                    None => Value::Null,
                })
                .collect();
            filter["topics"] = Value::Array(topics);
        }
        filter
    }

    /// Whether a log satisfies this filter (address, range and topics).
    pub fn matches(&self, log: &Log) -> bool {
        if log.address != self.address {
            return false;
        }
        if log.block_number < self.from_block || log.block_number > self.to_block {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            Some(topic) => log.topics.get(i) == Some(topic),
            None => true,
        })
    }
}

/// Left-pad an address into a 32-byte topic.
pub fn address_to_topic(addr: Address) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(addr.as_slice());
    B256::from(bytes)
}

/// Take the low 20 bytes of a 32-byte topic as an address.
pub fn topic_to_address(topic: B256) -> Address {
    Address::from_slice(&topic.as_slice()[12..])
}

// Hex deserialization helpers

/// Pad an odd-length hex string with a leading zero.
/// This handles cases where RPC returns hex strings without leading zeros.
fn pad_hex_string(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Err("empty quantity".to_string());
    }
    u64::from_str_radix(s, 16).map_err(|e| e.to_string())
}

fn parse_b256(s: &str) -> Result<B256, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(pad_hex_string(s)).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("Expected 32 bytes for hash, got {}", bytes.len()));
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_address(s: &str) -> Result<Address, String> {
    parse_user_address(s).map_err(|e| e.to_string())
}

/// Deserialize a hex string to u64.
fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_u64(&s).map_err(serde::de::Error::custom)
}

/// Deserialize an optional hex string to u64.
fn deserialize_hex_u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_u64(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Deserialize a hex string to B256.
fn deserialize_hex_b256<'de, D>(deserializer: D) -> Result<B256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_b256(&s).map_err(serde::de::Error::custom)
}

/// Deserialize a list of hex strings to B256 topics.
fn deserialize_hex_b256_vec<'de, D>(deserializer: D) -> Result<Vec<B256>, D::Error>
where
    D: Deserializer<'de>,
{
    let topics = Vec::<String>::deserialize(deserializer)?;
    topics
        .iter()
        .map(|s| parse_b256(s).map_err(serde::de::Error::custom))
        .collect()
}

/// Deserialize a hex string to Address.
fn deserialize_hex_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_address(&s).map_err(serde::de::Error::custom)
}

/// Deserialize an optional hex string to Address.
fn deserialize_hex_address_opt<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if s.strip_prefix("0x").unwrap_or(&s).is_empty() => Ok(None),
        Some(s) => parse_address(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Deserialize a hex string to bytes.
fn deserialize_hex_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        hex::decode(pad_hex_string(s)).map_err(serde::de::Error::custom)
    }
}
