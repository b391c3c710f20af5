//! Gamma Ledger - a single-node account ledger replayed from an append-only block log
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, account state, block rules and the ledger itself
//! - [`transaction`] - Transaction types, encoding and validation
//! - [`mempool`] - Pending transactions awaiting the next block
//!
//! ## Consensus
//! - [`miner`] - Difficulty-nonce search
//!
//! ## Cryptography
//! - [`crypto`] - Addresses, hashes and recoverable secp256k1 signatures
//!
//! ## State Management
//! - [`genesis`] - Genesis document
//! - [`persistence`] - Data directory layout and block log backends
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod genesis;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use blockchain::{Block, BlockHeader, Ledger, SharedLedger};
pub use crypto::{Address, Hash};
pub use error::{ChainError, Result};
pub use genesis::Genesis;
pub use transaction::{SignedTx, Tx};
