//! CLI implementation for questctl
//!
//! Runs quest checks from the command line. All commands output pretty JSON.

use crate::cache::MemoryScanStore;
use crate::config::{load_config, load_watchlist, QuestConfig, RuleConfig};
use crate::error::Verdict;
use crate::records::{Interaction, InteractionDetail, ScanState};
use crate::registry::QuestBook;
use crate::retry::RetryOpts;
use crate::rpc::{ChainReader, RpcClient};
use crate::store::{RocksScanStore, ScanStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Quest verification CLI tool
#[derive(Parser, Debug)]
#[command(name = "questctl")]
#[command(about = "Verify on-chain quest completion for wallet addresses")]
pub struct Cli {
    /// Path to a JSON configuration file (built-in defaults otherwise)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// RPC endpoint URL, overrides the configuration
    #[arg(short, long, global = true)]
    pub rpc_url: Option<String>,

    /// Path to a RocksDB directory for persistent scan state (in-memory otherwise)
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    /// RPC request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every interaction found for an address
    Check {
        /// Checker id (see `checkers`)
        checker: String,
        /// Wallet address (hex, with or without 0x prefix)
        address: String,
    },
    /// Report whether an address completed a quest
    Has {
        checker: String,
        address: String,
    },
    /// Show the most recent interaction of an address
    Latest {
        checker: String,
        address: String,
    },
    /// Verify with retries, for freshly submitted transactions
    Verify {
        checker: String,
        address: String,
        /// Total attempts (configured value otherwise)
        #[arg(long)]
        retries: Option<u32>,
        /// Delay between attempts in milliseconds (configured value otherwise)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Check every address of a list file (one address per line)
    Batch {
        checker: String,
        watchlist: PathBuf,
    },
    /// Show the stored scan state of an address
    State {
        checker: String,
        address: String,
    },
    /// Clear cached scan state
    Clear {
        /// Only this checker (all checkers otherwise)
        #[arg(long)]
        checker: Option<String>,
        /// Only this address (all addresses otherwise)
        #[arg(long)]
        address: Option<String>,
    },
    /// List configured checkers
    Checkers,
}

impl Commands {
    /// Whether the command reads the chain. Offline commands skip the
    /// chain id check.
    pub fn needs_chain(&self) -> bool {
        !matches!(
            self,
            Commands::Clear { .. } | Commands::State { .. } | Commands::Checkers
        )
    }
}

/// JSON view of an interaction.
pub fn interaction_json(interaction: &Interaction) -> Value {
    let detail = match &interaction.detail {
        InteractionDetail::None => Value::Null,
        InteractionDetail::Mint { token_id } => json!({
            "type": "mint",
            "token_id": token_id.to_string(),
        }),
        InteractionDetail::Stake {
            amount,
            lock_period,
        } => json!({
            "type": "stake",
            "amount": amount.to_string(),
            "lock_period": lock_period.to_string(),
        }),
    };
    json!({
        "transaction_hash": format!("0x{:x}", interaction.transaction_hash),
        "block_number": interaction.block_number,
        "from": format!("0x{:x}", interaction.from),
        "to": format!("0x{:x}", interaction.to),
        "method_id": interaction.method_id,
        "input": format!("0x{}", hex::encode(&interaction.input)),
        "detail": detail,
    })
}

/// JSON view of a stored scan state.
pub fn state_json(state: &ScanState) -> Value {
    json!({
        "address": state.address,
        "last_scanned_block": state.last_scanned_block,
        "fetched_at": state.fetched_at,
        "matches": state.matches.iter().map(interaction_json).collect::<Vec<_>>(),
    })
}

fn rule_json(rule: &RuleConfig) -> Value {
    match rule {
        RuleConfig::NftMint { contract } => json!({
            "kind": "nft-mint",
            "contract": format!("0x{:x}", contract),
        }),
        RuleConfig::StakeEvent {
            stake_manager,
            min_stake,
        } => json!({
            "kind": "stake-event",
            "stake_manager": format!("0x{:x}", stake_manager),
            "min_stake": min_stake,
        }),
        RuleConfig::StakeMethod {
            vault,
            selector,
            min_stake,
        } => json!({
            "kind": "stake-method",
            "vault": format!("0x{:x}", vault),
            "selector": selector,
            "min_stake": min_stake,
        }),
        RuleConfig::ContractInteraction {
            proxy,
            implementation,
        } => json!({
            "kind": "contract-interaction",
            "proxy": format!("0x{:x}", proxy),
            "implementation": implementation.map(|a| format!("0x{:x}", a)),
        }),
    }
}

/// Execute one command against a quest book.
pub async fn execute(command: &Commands, config: &QuestConfig, book: &QuestBook) -> Result<Value> {
    let result = match command {
        Commands::Check { checker, address } => {
            let matches = book.checker(checker)?.check_interactions(address).await?;
            json!({
                "checker": checker,
                "address": address,
                "count": matches.len(),
                "interactions": matches.iter().map(interaction_json).collect::<Vec<_>>(),
            })
        }
        Commands::Has { checker, address } => {
            let verdict = book.checker(checker)?.verdict(address).await;
            let reason = match &verdict {
                Verdict::Unknown(reason) => Some(reason.clone()),
                _ => None,
            };
            json!({
                "checker": checker,
                "address": address,
                "verdict": verdict.as_str(),
                "completed": verdict.is_found(),
                "reason": reason,
            })
        }
        Commands::Latest { checker, address } => {
            let latest = book.checker(checker)?.get_latest(address).await;
            json!({
                "checker": checker,
                "address": address,
                "latest": latest.as_ref().map(interaction_json),
            })
        }
        Commands::Verify {
            checker,
            address,
            retries,
            delay_ms,
        } => {
            let defaults = book.retry_opts();
            let opts = RetryOpts {
                max_retries: retries.unwrap_or(defaults.max_retries),
                delay: delay_ms.map(Duration::from_millis).unwrap_or(defaults.delay),
            };
            // Fail on a typo instead of retrying it
            book.checker(checker)?;
            let verified = book.verify_with_opts(checker, address, opts).await;
            json!({
                "checker": checker,
                "address": address,
                "verified": verified,
                "max_attempts": opts.max_retries,
            })
        }
        Commands::Batch { checker, watchlist } => {
            let quest = book.checker(checker)?;
            let addresses = load_watchlist(watchlist)?;
            info!("Checking {} addresses with {}", addresses.len(), checker);
            let mut results = Vec::with_capacity(addresses.len());
            for addr in addresses {
                let address = format!("0x{:x}", addr);
                let verdict = quest.verdict(&address).await;
                results.push(json!({
                    "address": address,
                    "verdict": verdict.as_str(),
                    "completed": verdict.is_found(),
                }));
            }
            json!({
                "checker": checker,
                "count": results.len(),
                "results": results,
            })
        }
        Commands::State { checker, address } => {
            let state = book.checker(checker)?.scan_state(address)?;
            json!({
                "checker": checker,
                "address": address,
                "state": state.as_ref().map(state_json),
            })
        }
        Commands::Clear { checker, address } => {
            let removed = match checker {
                Some(id) => book.clear(id, address.as_deref())?,
                None => book.clear_all(address.as_deref())?,
            };
            json!({
                "status": "ok",
                "checker": checker,
                "address": address,
                "removed": removed,
            })
        }
        Commands::Checkers => {
            let checkers: Vec<Value> = config
                .checkers
                .iter()
                .map(|entry| {
                    let settings = config.settings_for(entry);
                    json!({
                        "id": entry.id,
                        "window": settings.window,
                        "start_block": settings.start_block,
                        "rule": rule_json(&entry.rule),
                    })
                })
                .collect();
            json!({
                "rpc_url": config.rpc_url,
                "chain_id": config.chain_id,
                "max_blocks_per_query": config.max_blocks_per_query,
                "checkers": checkers,
            })
        }
    };
    Ok(result)
}

/// Run the CLI command and print JSON output.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => QuestConfig::default(),
    };
    if let Some(url) = &cli.rpc_url {
        config.rpc_url = url.clone();
    }

    let chain: Arc<dyn ChainReader> = Arc::new(RpcClient::with_timeout(
        config.rpc_url.clone(),
        Duration::from_secs(cli.timeout_secs),
    )?);
    let store: Arc<dyn ScanStore> = match &cli.db_path {
        Some(path) => Arc::new(
            RocksScanStore::open(path)
                .with_context(|| format!("Failed to open database at {:?}", path))?,
        ),
        None => Arc::new(MemoryScanStore::new(config.cache.capacity)),
    };
    let book = if cli.command.needs_chain() {
        QuestBook::connect(&config, chain, store).await?
    } else {
        QuestBook::from_config(&config, chain, store)?
    };

    let result = execute(&cli.command, &config, &book).await?;

    // Pretty print JSON
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stake_calldata, FakeChain};
    use crate::types::{Log, Transaction};
    use alloy_primitives::{address, B256, U256};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const USER: &str = "0xb248a284756a52c7ec5fb119648747128c1ec28b";
    const HEAD: u64 = 11_800_000;

    fn setup() -> (QuestConfig, QuestBook) {
        let vault = address!("c13Bf1d5986D8831116E36d11b4d2AE859258C7D");
        let hash = B256::repeat_byte(0x77);
        let chain = Arc::new(FakeChain::new(HEAD));
        chain.add_log(Log {
            address: vault,
            topics: Vec::new(),
            data: Vec::new(),
            block_number: HEAD - 40,
            transaction_hash: hash,
            log_index: 0,
        });
        chain.add_transaction(Transaction {
            hash,
            from: address!("b248A284756a52C7eC5Fb119648747128c1eC28b"),
            to: Some(vault),
            input: stake_calldata(
                U256::from(250u64) * U256::from(10u64).pow(U256::from(18u64)),
                U256::from(604_800u64),
            ),
            block_number: Some(HEAD - 40),
        });
        let config = QuestConfig::default();
        let book = QuestBook::from_config(
            &config,
            chain as Arc<dyn ChainReader>,
            Arc::new(MemoryScanStore::default()) as Arc<dyn ScanStore>,
        )
        .unwrap();
        (config, book)
    }

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "questctl",
            "verify",
            "vault-stake",
            USER,
            "--retries",
            "5",
            "--db-path",
            "/tmp/quests",
        ])
        .unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/quests")));
        match cli.command {
            Commands::Verify {
                retries, delay_ms, ..
            } => {
                assert_eq!(retries, Some(5));
                assert_eq!(delay_ms, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_and_has() {
        let (config, book) = setup();
        let check = Commands::Check {
            checker: "vault-stake".to_string(),
            address: USER.to_string(),
        };
        let result = execute(&check, &config, &book).await.unwrap();
        assert_eq!(result["count"], 1);
        let first = &result["interactions"][0];
        assert_eq!(first["method_id"], "0x7b0472f0");
        assert_eq!(first["detail"]["type"], "stake");
        assert_eq!(first["detail"]["amount"], "250000000000000000000");

        let has = Commands::Has {
            checker: "nft-mint".to_string(),
            address: USER.to_string(),
        };
        let result = execute(&has, &config, &book).await.unwrap();
        assert_eq!(result["verdict"], "not_found");
        assert_eq!(result["completed"], false);
    }

    #[tokio::test]
    async fn test_state_and_clear() {
        let (config, book) = setup();
        let state = Commands::State {
            checker: "vault-stake".to_string(),
            address: USER.to_string(),
        };
        let before = execute(&state, &config, &book).await.unwrap();
        assert!(before["state"].is_null());

        book.checker("vault-stake")
            .unwrap()
            .check_interactions(USER)
            .await
            .unwrap();
        let after = execute(&state, &config, &book).await.unwrap();
        assert_eq!(after["state"]["last_scanned_block"], HEAD);

        let clear = Commands::Clear {
            checker: None,
            address: None,
        };
        let result = execute(&clear, &config, &book).await.unwrap();
        assert_eq!(result["removed"], 1);
    }

    #[tokio::test]
    async fn test_batch_and_unknown_checker() {
        let (config, book) = setup();
        let mut list = NamedTempFile::new().unwrap();
        writeln!(list, "{}", USER).unwrap();
        writeln!(list, "0x0000000000000000000000000000000000000abc").unwrap();
        list.flush().unwrap();

        let batch = Commands::Batch {
            checker: "vault-stake".to_string(),
            watchlist: list.path().to_path_buf(),
        };
        let result = execute(&batch, &config, &book).await.unwrap();
        assert_eq!(result["results"][0]["completed"], true);
        assert_eq!(result["results"][1]["completed"], false);

        let unknown = Commands::Latest {
            checker: "bridge".to_string(),
            address: USER.to_string(),
        };
        assert!(execute(&unknown, &config, &book).await.is_err());
    }

    #[tokio::test]
    async fn test_list_checkers() {
        let (config, book) = setup();
        let result = execute(&Commands::Checkers, &config, &book).await.unwrap();
        assert_eq!(result["chain_id"], 1_660_990_954u64);
        assert_eq!(result["checkers"][1]["rule"]["kind"], "stake-method");
        assert_eq!(result["checkers"][2]["window"], 15_000);
    }

    #[test]
    fn test_offline_commands_skip_chain_check() {
        let parse = |args: &[&str]| Cli::try_parse_from(args.iter().copied()).unwrap().command;
        assert!(!parse(&["questctl", "checkers"]).needs_chain());
        assert!(!parse(&["questctl", "clear", "--checker", "nft-mint"]).needs_chain());
        assert!(parse(&["questctl", "has", "nft-mint", "0x01"]).needs_chain());
        assert!(!parse(&["questctl", "state", "nft-mint", "0x01"]).needs_chain());
        assert!(parse(&["questctl", "batch", "nft-mint", "list.txt"]).needs_chain());
    }
}
