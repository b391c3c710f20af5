//! Error types for the gamma ledger

use crate::crypto::{Address, Hash};
use thiserror::Error;

/// A rule violation. Raising one never leaves a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("wrong TX. Sender '{from}' is forged")]
    Forged { from: Address },

    #[error("signature recovery failed: {0}")]
    SignatureRecovery(String),

    #[error("wrong TX. Sender '{from}' next nonce must be '{expected}', not '{got}'")]
    NonceMismatch { from: Address, expected: u64, got: u64 },

    #[error("invalid TX. `gas` and `gasPrice` can't be populated before the fork is active")]
    GasBeforeFork,

    #[error("insufficient TX gas {got}. required: {required}")]
    InsufficientGas { got: u64, required: u64 },

    #[error("insufficient TX gasPrice {got}. required at least: {required}")]
    InsufficientGasPrice { got: u64, required: u64 },

    #[error("wrong TX. Sender '{from}' balance is {balance}. Tx cost is {cost}")]
    InsufficientBalance { from: Address, balance: u64, cost: u64 },

    #[error("balance of '{account}' would overflow")]
    BalanceOverflow { account: Address },

    #[error("wrong TX. Sender '{from}' cost overflows")]
    CostOverflow { from: Address },

    #[error("reward of block miner '{miner}' overflows")]
    RewardOverflow { miner: Address },

    #[error("next expected block must be '{expected}' not '{got}'")]
    BlockNumber { expected: u64, got: u64 },

    #[error("next block parent hash must be '{expected}' not '{got}'")]
    ParentHash { expected: Hash, got: Hash },

    #[error("invalid block hash {hash} for difficulty {difficulty}")]
    Difficulty { hash: Hash, difficulty: u32 },

    #[error("stored block hash {stored} does not match computed hash {computed}")]
    RecordHashMismatch { stored: Hash, computed: Hash },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Malformed address, hash, JSON record or genesis document.
    #[error("Format error: {0}")]
    Format(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mining gave up after {attempts} attempts at difficulty {difficulty}")]
    MiningExhausted { attempts: u64, difficulty: u32 },
}

impl ChainError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ChainError::Validation(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, ChainError::Format(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, ChainError::Io(_))
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Format(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
