//! Pending transactions accepted since the last persisted block.

use crate::transaction::SignedTx;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<SignedTx>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: SignedTx) {
        self.transactions.push(tx);
    }

    pub fn transactions(&self) -> &[SignedTx] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Keeps transactions for which `keep` returns true, in order.
    pub fn retain<F: FnMut(&SignedTx) -> bool>(&mut self, keep: F) {
        self.transactions.retain(keep);
    }
}
