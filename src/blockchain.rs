// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// block and ledger management, account state and block rules.

pub mod core;
pub use core::*;
