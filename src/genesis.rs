//! Genesis configuration: symbol, initial balances and fork activation height.

use crate::crypto::Address;
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub symbol: String,
    pub balances: BTreeMap<Address, u64>,
    /// First block number at which gas accounting replaces the flat fee.
    #[serde(rename = "fork_tip_1", default)]
    pub fork_tip_1: u64,
}

impl Genesis {
    pub fn new(symbol: impl Into<String>, balances: BTreeMap<Address, u64>, fork_tip_1: u64) -> Self {
        Genesis {
            symbol: symbol.into(),
            balances,
            fork_tip_1,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ChainError::Format(format!("Invalid genesis document: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ChainError::Io(format!("Failed to read genesis {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|b| u128::from(*b)).sum()
    }
}
