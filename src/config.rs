//! Configuration management for the gamma ledger

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_mining_difficulty")]
    pub mining_difficulty: u32,
}

/// Genesis used to initialize a fresh data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            mining_difficulty: default_mining_difficulty(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_mining_difficulty() -> u32 {
    1
}

/// Loads `config.toml` from the working directory, or defaults when absent.
pub fn load_config() -> Result<Config> {
    load_config_from(Path::new(CONFIG_FILE))
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let config_str = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ChainError::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::Config(format!("{}: {}", path.display(), e)))?
    };

    // Validate critical values
    if config.ledger.data_dir.as_os_str().is_empty() {
        return Err(ChainError::Config(
            "ledger.data_dir must be set in config.toml".to_string(),
        ));
    }

    if config.ledger.mining_difficulty >= 64 {
        return Err(ChainError::Config(format!(
            "ledger.mining_difficulty {} can never be satisfied",
            config.ledger.mining_difficulty
        )));
    }

    Ok(config)
}
