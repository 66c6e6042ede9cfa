//! Node configuration: optional TOML file, then `BWHUB_` environment
//! variables, then command-line overrides.

use anyhow::{bail, Context, Result};
use bwhub_ledger::Params;
use config::{Config, ConfigError, File as ConfigFile};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/bwhub.toml";
const DEFAULT_DATA_DIR: &str = "./data/bwhub";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub genesis: Option<PathBuf>,
    pub log_level: String,
    pub log_format: String,
    pub params: Params,
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

impl AppConfig {
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path)
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|path| path.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("BWHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let config = builder.build()?;

        let data_dir = PathBuf::from(
            get_string_value(&config, &["data_dir"]).unwrap_or_else(|| DEFAULT_DATA_DIR.into()),
        );
        let db_path = get_string_value(&config, &["db_path"])
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("db"));
        let params = match config.get::<Params>("params") {
            Ok(params) => params,
            Err(ConfigError::NotFound(_)) => Params::default(),
            Err(err) => return Err(err).context("invalid [params] section"),
        };

        Ok(Self {
            config_path: resolved_path,
            data_dir,
            db_path,
            genesis: get_string_value(&config, &["genesis"]).map(PathBuf::from),
            log_level: get_string_value(&config, &["log_level"]).unwrap_or_else(|| "info".into()),
            log_format: get_string_value(&config, &["log_format"])
                .unwrap_or_else(|| "pretty".into()),
            params,
        })
    }

    pub fn apply_overrides(&mut self, matches: &clap::ArgMatches) {
        if let Some(data_dir) = matches.get_one::<String>("data-dir") {
            self.data_dir = PathBuf::from(data_dir);
            self.db_path = self.data_dir.join("db");
        }
        if let Some(genesis) = matches.get_one::<String>("genesis") {
            self.genesis = Some(PathBuf::from(genesis));
        }
        if let Some(log_level) = matches.get_one::<String>("log-level") {
            self.log_level = log_level.clone();
        }
        if let Some(log_format) = matches.get_one::<String>("log-format") {
            self.log_format = log_format.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            bail!("DATA_DIR must not be empty");
        }
        if self.db_path.as_os_str().is_empty() {
            bail!("DB_PATH must not be empty");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!(
                "Invalid LOG_FORMAT '{}'; expected 'pretty' or 'json'",
                self.log_format
            );
        }
        self.params
            .validate()
            .map_err(|err| anyhow::anyhow!("invalid engine parameters: {err}"))?;
        Ok(())
    }

    /// Where the replayed bank balances are kept between runs.
    pub fn bank_path(&self) -> PathBuf {
        self.data_dir.join("bank.json")
    }
}

pub fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path)?;
    config.apply_overrides(matches);
    config.validate()?;
    Ok(config)
}

pub fn ensure_directory(path: &Path) -> std::result::Result<(), String> {
    std::fs::create_dir_all(path)
        .map_err(|err| format!("Cannot create directory {}: {err}", path.display()))
}
