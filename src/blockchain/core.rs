// core.rs splits the ledger into submodules: chain (blocks, replay, the
// ledger itself), state (account balances and nonces) and validation
// (difficulty predicate and chain linkage).
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
