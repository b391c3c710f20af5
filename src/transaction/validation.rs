/// Validation logic for transactions separated from type definitions
use crate::blockchain::AccountState;
use crate::crypto::Address;
use crate::error::{Result, ValidationError};
use crate::transaction::types::{SignedTx, Tx, TX_GAS, TX_GAS_PRICE_DEFAULT};

impl Tx {
    /// Before the fork both gas fields must be zero; afterwards gas is fixed
    /// and the price has a floor.
    pub fn validate_gas_fields(&self, fork_active: bool) -> std::result::Result<(), ValidationError> {
        if fork_active {
            if self.gas != TX_GAS {
                return Err(ValidationError::InsufficientGas {
                    got: self.gas,
                    required: TX_GAS,
                });
            }
            if self.gas_price < TX_GAS_PRICE_DEFAULT {
                return Err(ValidationError::InsufficientGasPrice {
                    got: self.gas_price,
                    required: TX_GAS_PRICE_DEFAULT,
                });
            }
        } else if self.gas != 0 || self.gas_price != 0 {
            return Err(ValidationError::GasBeforeFork);
        }
        Ok(())
    }
}

impl SignedTx {
    /// Checks this transaction against `state` without touching it.
    ///
    /// Order: authenticity, nonce, gas fields, balance. A mint only needs to
    /// be authentic and must not overflow the receiver.
    pub fn validate(&self, state: &AccountState, fork_active: bool) -> Result<()> {
        self.verify_authenticity()?;

        if self.is_mint() {
            return check_credit(state, self.to(), self.value());
        }

        let from = self.from();
        let expected = state.next_nonce_of(&from);
        if self.nonce() != expected {
            return Err(ValidationError::NonceMismatch {
                from,
                expected,
                got: self.nonce(),
            }
            .into());
        }

        self.inner().validate_gas_fields(fork_active)?;

        let cost = self
            .cost(fork_active)
            .ok_or(ValidationError::CostOverflow { from })?;
        let balance = state.balance_of(&from);
        if cost > balance {
            return Err(ValidationError::InsufficientBalance { from, balance, cost }.into());
        }

        // a self-transfer credits back less than it debits
        if self.to() != from {
            check_credit(state, self.to(), self.value())?;
        }
        Ok(())
    }
}

fn check_credit(state: &AccountState, account: Address, amount: u64) -> Result<()> {
    state
        .balance_of(&account)
        .checked_add(amount)
        .map(|_| ())
        .ok_or_else(|| ValidationError::BalanceOverflow { account }.into())
}
