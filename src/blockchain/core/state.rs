use crate::crypto::Address;
use crate::error::{Result, ValidationError};
use crate::genesis::Genesis;
use crate::transaction::SignedTx;
use std::collections::HashMap;

/// Balances and last-used nonces of every account.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccountState {
    pub balances: HashMap<Address, u64>,
    pub nonces: HashMap<Address, u64>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_genesis(genesis: &Genesis) -> Self {
        AccountState {
            balances: genesis.balances.iter().map(|(a, b)| (*a, *b)).collect(),
            nonces: HashMap::new(),
        }
    }

    pub fn balance_of(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Nonce of the last accepted transaction from `address`, zero if none.
    pub fn nonce_of(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    pub fn next_nonce_of(&self, address: &Address) -> u64 {
        self.nonce_of(address) + 1
    }

    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|b| u128::from(*b)).sum()
    }

    pub fn credit(&mut self, address: Address, amount: u64) -> Result<()> {
        let balance = self.balances.entry(address).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(ValidationError::BalanceOverflow { account: address })?;
        Ok(())
    }

    /// Validates `tx` and, only if it passes, applies it.
    pub fn apply_transaction(&mut self, tx: &SignedTx, fork_active: bool) -> Result<()> {
        tx.validate(self, fork_active)?;

        if tx.is_mint() {
            *self.balances.entry(tx.to()).or_insert(0) += tx.value();
            return Ok(());
        }

        let cost = tx
            .cost(fork_active)
            .ok_or(ValidationError::CostOverflow { from: tx.from() })?;
        // validate() has bounded both sides, neither step can wrap
        *self.balances.entry(tx.from()).or_insert(0) -= cost;
        *self.balances.entry(tx.to()).or_insert(0) += tx.value();
        self.nonces.insert(tx.from(), tx.nonce());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Tx, MINT_DATA, TX_FEE};
    use std::collections::BTreeMap;

    fn account(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from_bytes(bytes)
    }

    fn genesis_state() -> AccountState {
        let mut balances = BTreeMap::new();
        balances.insert(account(1), 1_000_000);
        balances.insert(account(2), 1);
        AccountState::from_genesis(&Genesis::new("TGL", balances, 35))
    }

    #[test]
    fn test_transfer_debits_cost_and_sets_nonce() {
        let mut state = genesis_state();
        let tx = SignedTx::trusted(Tx::new_legacy(account(1), account(2), 3, 1, ""));
        state.apply_transaction(&tx, false).unwrap();

        assert_eq!(state.balance_of(&account(1)), 1_000_000 - 3 - TX_FEE);
        assert_eq!(state.balance_of(&account(2)), 4);
        assert_eq!(state.nonce_of(&account(1)), 1);
        assert_eq!(state.next_nonce_of(&account(1)), 2);
    }

    #[test]
    fn test_mint_only_credits_receiver() {
        let mut state = genesis_state();
        let before = state.clone();
        let mint = SignedTx::trusted(Tx::new_legacy(account(1), account(1), 100, 0, MINT_DATA));
        state.apply_transaction(&mint, false).unwrap();

        assert_eq!(state.balance_of(&account(1)), before.balance_of(&account(1)) + 100);
        assert_eq!(state.balance_of(&account(2)), before.balance_of(&account(2)));
        assert_eq!(state.nonces, before.nonces);
    }

    #[test]
    fn test_rejected_transaction_leaves_state_untouched() {
        let mut state = genesis_state();
        let before = state.clone();
        let broke = SignedTx::trusted(Tx::new_legacy(account(2), account(1), 1, 1, ""));
        assert!(state.apply_transaction(&broke, false).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_self_transfer_only_burns_fee() {
        let mut state = genesis_state();
        let tx = SignedTx::trusted(Tx::new_legacy(account(1), account(1), 500, 1, ""));
        state.apply_transaction(&tx, false).unwrap();
        assert_eq!(state.balance_of(&account(1)), 1_000_000 - TX_FEE);
    }

    #[test]
    fn test_credit_overflow() {
        let mut state = AccountState::new();
        state.credit(account(3), u64::MAX).unwrap();
        assert!(state.credit(account(3), 1).unwrap_err().is_validation());
        assert_eq!(state.balance_of(&account(3)), u64::MAX);
    }
}
