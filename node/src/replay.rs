//! Block-file replay against the persistent store.

use crate::config::AppConfig;
use anyhow::{bail, Context, Result};
use bwhub_ledger::{App, Bank, InMemoryBank, Msg, Params};
use bwhub_storage::SledStore;
use bwhub_types::{Address, Coins, Height};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Initial bank balances, plus optional engine parameters that take
/// precedence over the configured ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Genesis {
    #[serde(default)]
    pub balances: BTreeMap<Address, Coins>,
    #[serde(default)]
    pub params: Option<Params>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tx {
    pub signer: Address,
    pub msg: Msg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: Height,
    #[serde(default)]
    pub txs: Vec<Tx>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub blocks: usize,
    pub last_height: Height,
    pub accepted: usize,
    pub rejected: usize,
    pub events: usize,
    pub deactivated_nodes: usize,
    pub failed_cascades: usize,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {what} {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {what} {}", path.display()))
}

/// Bank state to resume from: the saved balances if the store already holds
/// blocks, the genesis balances otherwise.
fn load_bank(config: &AppConfig, genesis: &Genesis, resuming: bool) -> Result<InMemoryBank> {
    let saved = config.bank_path();
    if resuming {
        if !saved.exists() {
            bail!(
                "store at {} has blocks but {} is missing",
                config.db_path.display(),
                saved.display()
            );
        }
        return read_json(&saved, "bank state");
    }
    InMemoryBank::with_balances(genesis.balances.clone())
        .map_err(|err| anyhow::anyhow!("invalid genesis balances: {err}"))
}

/// Apply `blocks` in order. A rejected transaction is logged and counted; it
/// never aborts the replay.
pub fn apply_blocks<B: Bank>(
    app: &mut App<SledStore, B>,
    blocks: &[Block],
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for block in blocks {
        let report = app
            .begin_block(block.height)
            .with_context(|| format!("beginning block {}", block.height))?;
        summary.deactivated_nodes += report.deactivated.len();
        summary.failed_cascades += report.failed.len();

        for (index, tx) in block.txs.iter().enumerate() {
            match app.deliver(&tx.signer, &tx.msg) {
                Ok(events) => {
                    summary.accepted += 1;
                    summary.events += events.len();
                }
                Err(err) => {
                    summary.rejected += 1;
                    warn!(
                        height = block.height,
                        index,
                        kind = tx.msg.kind(),
                        code = err.code(),
                        "transaction rejected: {err}"
                    );
                }
            }
        }
        summary.blocks += 1;
        summary.last_height = block.height;
    }
    Ok(summary)
}

pub fn run(config: &AppConfig, blocks_path: &Path) -> Result<ReplaySummary> {
    let genesis: Genesis = match &config.genesis {
        Some(path) => read_json(path, "genesis")?,
        None => Genesis::default(),
    };
    let params = genesis.params.clone().unwrap_or_else(|| config.params.clone());
    let blocks: Vec<Block> = read_json(blocks_path, "blocks")?;

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let store = SledStore::open(&config.db_path)
        .with_context(|| format!("opening store {}", config.db_path.display()))?;
    let resuming = bwhub_storage::KvStoreExt::get_u64(&store, bwhub_ledger::keys::LAST_HEIGHT_KEY)?
        .is_some();
    let bank = load_bank(config, &genesis, resuming)?;

    let mut app = App::new(store, bank, params)?;
    info!(
        height = app.height(),
        blocks = blocks.len(),
        "replaying blocks from {}",
        blocks_path.display()
    );
    let summary = apply_blocks(&mut app, &blocks)?;
    app.store().flush()?;
    fs::write(config.bank_path(), serde_json::to_vec_pretty(app.bank())?)
        .with_context(|| format!("writing {}", config.bank_path().display()))?;
    info!(
        height = summary.last_height,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "replay finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwhub_ledger::{MsgFundDeposit, MsgWithdrawDeposit};
    use bwhub_types::Coin;
    use std::path::PathBuf;

    fn test_config(dir: &Path, genesis: Option<PathBuf>) -> AppConfig {
        AppConfig {
            config_path: None,
            data_dir: dir.to_path_buf(),
            db_path: dir.join("db"),
            genesis,
            log_level: "info".into(),
            log_format: "pretty".into(),
            params: Params::default(),
        }
    }

    fn alice() -> Address {
        Address::new([1u8; 32])
    }

    fn utok(amount: u128) -> Coins {
        Coins::from(Coin::new("utok", amount))
    }

    #[test]
    fn replay_applies_blocks_and_resumes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let genesis_path = dir.path().join("genesis.json");
        let genesis = Genesis {
            balances: BTreeMap::from([(alice(), utok(100))]),
            params: None,
        };
        fs::write(&genesis_path, serde_json::to_vec(&genesis).unwrap()).unwrap();

        let blocks = vec![
            Block {
                height: 1,
                txs: vec![Tx {
                    signer: alice(),
                    msg: Msg::FundDeposit(MsgFundDeposit { coins: utok(60) }),
                }],
            },
            Block {
                height: 2,
                txs: vec![Tx {
                    signer: alice(),
                    msg: Msg::WithdrawDeposit(MsgWithdrawDeposit { coins: utok(61) }),
                }],
            },
        ];
        let blocks_path = dir.path().join("blocks.json");
        fs::write(&blocks_path, serde_json::to_vec(&blocks).unwrap()).unwrap();

        let config = test_config(&dir.path().join("node"), Some(genesis_path));
        let summary = run(&config, &blocks_path).unwrap();
        assert_eq!(summary.blocks, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.last_height, 2);

        let saved: InMemoryBank = read_json(&config.bank_path(), "bank state").unwrap();
        assert_eq!(saved.balance(&alice()), utok(40));

        let more = vec![Block {
            height: 3,
            txs: vec![Tx {
                signer: alice(),
                msg: Msg::WithdrawDeposit(MsgWithdrawDeposit { coins: utok(60) }),
            }],
        }];
        fs::write(&blocks_path, serde_json::to_vec(&more).unwrap()).unwrap();
        let summary = run(&config, &blocks_path).unwrap();
        assert_eq!(summary.accepted, 1);
        let saved: InMemoryBank = read_json(&config.bank_path(), "bank state").unwrap();
        assert_eq!(saved.balance(&alice()), utok(100));
    }

    #[test]
    fn replaying_an_old_height_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocks_path = dir.path().join("blocks.json");
        let blocks = vec![Block { height: 1, txs: vec![] }];
        fs::write(&blocks_path, serde_json::to_vec(&blocks).unwrap()).unwrap();

        let config = test_config(&dir.path().join("node"), None);
        run(&config, &blocks_path).unwrap();
        let err = run(&config, &blocks_path).unwrap_err();
        assert!(err.to_string().contains("block 1"), "unexpected error: {err}");
    }
}
