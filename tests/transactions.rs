use gamma_ledger::blockchain::{Block, BlockHeader, Ledger};
use gamma_ledger::crypto::{Address, Hash, KeyPair};
use gamma_ledger::error::{ChainError, ValidationError};
use gamma_ledger::genesis::Genesis;
use gamma_ledger::persistence::init_data_dir;
use gamma_ledger::transaction::{SignedTx, Tx, MINT_DATA, TX_FEE, TX_GAS};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn open(fork_tip_1: u64) -> (TempDir, KeyPair, KeyPair, Ledger) {
    let dir = TempDir::new().unwrap();
    let alice = KeyPair::generate().unwrap();
    let bob = KeyPair::generate().unwrap();

    let mut balances = BTreeMap::new();
    balances.insert(alice.address(), 1_000_000);
    balances.insert(bob.address(), 1);
    init_data_dir(dir.path(), &Genesis::new("TGL", balances, fork_tip_1)).unwrap();

    let ledger = Ledger::new_from_disk(dir.path(), 1).unwrap();
    (dir, alice, bob, ledger)
}

fn signed(keypair: &KeyPair, tx: Tx) -> SignedTx {
    let signature = keypair.sign_hash(&tx.hash().unwrap()).unwrap();
    SignedTx::new(tx, signature.to_vec())
}

#[test]
fn test_wrong_nonce_is_rejected_without_effect() {
    let (_dir, alice, bob, mut ledger) = open(35);
    let balances = ledger.balances().clone();

    for nonce in [0, 2, 9] {
        let tx = signed(&alice, Tx::new_legacy(alice.address(), bob.address(), 3, nonce, ""));
        let err = ledger.accept_transaction(tx).unwrap_err();
        assert_eq!(
            err,
            ChainError::Validation(ValidationError::NonceMismatch {
                from: alice.address(),
                expected: 1,
                got: nonce,
            })
        );
    }

    assert_eq!(ledger.balances(), &balances);
    assert_eq!(ledger.next_nonce_of(&alice.address()), 1);
}

#[test]
fn test_cost_above_balance_is_rejected() {
    let (_dir, alice, bob, mut ledger) = open(35);
    // bob holds 1, the flat fee alone is 50
    let tx = signed(&bob, Tx::new_legacy(bob.address(), alice.address(), 1, 1, ""));
    assert!(matches!(
        ledger.accept_transaction(tx).unwrap_err(),
        ChainError::Validation(ValidationError::InsufficientBalance { balance: 1, cost, .. })
            if cost == 1 + TX_FEE
    ));
    assert_eq!(ledger.balance_of(&bob.address()), 1);
    assert_eq!(ledger.balance_of(&alice.address()), 1_000_000);
}

#[test]
fn test_forged_sender_is_rejected() {
    let (_dir, alice, bob, mut ledger) = open(35);
    let tx = Tx::new_legacy(alice.address(), bob.address(), 3, 1, "");
    let forged = signed(&bob, tx);
    assert!(matches!(
        ledger.accept_transaction(forged).unwrap_err(),
        ChainError::Validation(ValidationError::Forged { .. })
    ));
}

#[test]
fn test_mint_credits_only_receiver() {
    let (_dir, alice, bob, mut ledger) = open(35);
    let mint = signed(&alice, Tx::new_legacy(alice.address(), alice.address(), 100, 0, MINT_DATA));
    ledger.accept_transaction(mint).unwrap();

    assert_eq!(ledger.balance_of(&alice.address()), 1_000_100);
    assert_eq!(ledger.balance_of(&bob.address()), 1);
    assert_eq!(ledger.next_nonce_of(&alice.address()), 1);

    ledger.persist().unwrap();
    assert_eq!(ledger.balance_of(&alice.address()), 1_000_100);
    assert_eq!(ledger.nonce_of(&alice.address()), 0);
}

#[test]
fn test_gas_fields_wait_for_the_fork() {
    let (_dir, alice, bob, mut ledger) = open(1);

    let early = signed(&alice, Tx::new_base(alice.address(), bob.address(), 3, 1, ""));
    assert_eq!(
        ledger.accept_transaction(early).unwrap_err(),
        ChainError::Validation(ValidationError::GasBeforeFork)
    );

    ledger.persist().unwrap();
    assert!(ledger.is_fork_active());

    let late = signed(&alice, Tx::new_base(alice.address(), bob.address(), 3, 1, ""));
    ledger.accept_transaction(late).unwrap();
    assert_eq!(ledger.balance_of(&alice.address()), 1_000_000 - 3 - TX_GAS);
}

#[test]
fn test_legacy_transfer_rejected_after_fork() {
    let (_dir, alice, bob, mut ledger) = open(0);
    assert!(ledger.is_fork_active());
    let tx = signed(&alice, Tx::new_legacy(alice.address(), bob.address(), 3, 1, ""));
    assert!(matches!(
        ledger.accept_transaction(tx).unwrap_err(),
        ChainError::Validation(ValidationError::InsufficientGas { got: 0, .. })
    ));
}

#[test]
fn test_block_hash_tracks_every_field() {
    let tx = SignedTx::trusted(
        Tx::new_legacy(Address::default(), Address::default(), 3, 1, "").with_time(1_700_000_000),
    );
    let block = Block {
        header: BlockHeader {
            parent: Hash::digest(b"parent"),
            number: 4,
            nonce: 77,
            time: 1_700_000_001,
            miner: Address::default(),
        },
        transactions: vec![tx.clone()],
    };
    let base = block.hash().unwrap();
    assert_eq!(block.clone().hash().unwrap(), base);

    let with_tx = |tx: Tx| {
        let mut b = block.clone();
        b.transactions = vec![SignedTx::trusted(tx)];
        b.hash().unwrap()
    };
    let inner = tx.inner().clone();
    assert_ne!(with_tx(Tx { value: 4, ..inner.clone() }), base);
    assert_ne!(with_tx(Tx { nonce: 2, ..inner.clone() }), base);
    assert_ne!(with_tx(inner.clone().with_time(1_700_000_002)), base);

    let mut changed = block.clone();
    changed.header.parent = Hash::digest(b"other");
    assert_ne!(changed.hash().unwrap(), base);

    let mut changed = block.clone();
    changed.header.number = 5;
    assert_ne!(changed.hash().unwrap(), base);

    let mut changed = block;
    changed.header.miner = KeyPair::generate().unwrap().address();
    assert_ne!(changed.hash().unwrap(), base);
}
