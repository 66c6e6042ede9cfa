use anyhow::{Context, Result};
use bwhub_ledger::{App, InMemoryBank, PageRequest};
use bwhub_storage::SledStore;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod query;
mod replay;
mod version;

use config::{ensure_directory, load_config_with_overrides, AppConfig};
use version::{git_commit_hash, BWHUB_VERSION};

fn build_cli() -> Command {
    Command::new("bwhub-node")
        .version(BWHUB_VERSION)
        .about("Bandwidth marketplace ledger node")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory")
                .global(true),
        )
        .arg(
            Arg::new("genesis")
                .long("genesis")
                .value_name("FILE")
                .help("Genesis file with initial balances and parameters")
                .global(true),
        )
        .arg(
            Arg::new("version_flag")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print detailed version information and exit")
                .global(true),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Run configuration and environment self-checks, then exit")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a JSON block file into the store")
                .arg(
                    Arg::new("blocks")
                        .value_name("BLOCKS")
                        .required(true)
                        .help("JSON array of {height, txs: [{signer, msg}]}"),
                ),
        )
        .subcommand(
            Command::new("query")
                .about("Print a resource from the committed state as JSON")
                .arg(
                    Arg::new("resource")
                        .value_name("RESOURCE")
                        .required(true)
                        .value_parser(query::RESOURCES.to_vec()),
                )
                .arg(
                    Arg::new("args")
                        .value_name("KEY")
                        .num_args(0..)
                        .help("Resource keys: id, address or node address"),
                )
                .arg(
                    Arg::new("page")
                        .long("page")
                        .value_parser(value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize))
                        .default_value("100"),
                ),
        )
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = load_config_with_overrides(&matches)?;

    if matches.get_flag("version_flag") {
        print_version_info();
        return Ok(());
    }
    if matches.get_flag("check") {
        return run_self_check(&config);
    }

    init_logging(&config)?;
    info!(
        version = BWHUB_VERSION,
        data_dir = %config.data_dir.display(),
        config = ?config.config_path,
        "starting bwhub-node"
    );

    match matches.subcommand() {
        Some(("replay", sub)) => {
            let blocks = sub
                .get_one::<String>("blocks")
                .map(PathBuf::from)
                .context("missing block file")?;
            let summary = replay::run(&config, &blocks)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(("query", sub)) => {
            let resource = sub
                .get_one::<String>("resource")
                .context("missing resource")?;
            let args: Vec<String> = sub
                .get_many::<String>("args")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let page = PageRequest::new(
                sub.get_one::<usize>("page").copied().unwrap_or(1),
                sub.get_one::<usize>("limit").copied().unwrap_or(100),
            )?;

            let store = SledStore::open(&config.db_path)
                .with_context(|| format!("opening store {}", config.db_path.display()))?;
            let app = App::new(store, InMemoryBank::new(), config.params.clone())?;
            let value = query::run(&app.querier(), resource, &args, page)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn print_version_info() {
    println!("bwhub-node {} (commit {})", BWHUB_VERSION, git_commit_hash());
}

fn run_self_check(config: &AppConfig) -> Result<()> {
    println!("Running bwhub-node self-check...");
    let mut issues = Vec::new();

    if let Err(err) = ensure_directory(&config.data_dir) {
        issues.push(err);
    }
    if let Some(genesis) = &config.genesis {
        if !genesis.exists() {
            issues.push(format!("Genesis file {} does not exist", genesis.display()));
        }
    }
    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            issues.push(format!(
                "Database directory {} does not exist",
                parent.display()
            ));
        }
    }

    if issues.is_empty() {
        println!("OK");
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("- {issue}");
        }
        anyhow::bail!("self-check failed")
    }
}
