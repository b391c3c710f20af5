use crate::crypto::{Address, Hash};
use crate::error::{ChainError, Result, ValidationError};
use crate::genesis::Genesis;
use crate::mempool::Mempool;
use crate::miner::{mine_block, DEFAULT_MAX_ATTEMPTS};
use crate::persistence::{blocks_db_file_path, genesis_file_path, BlockStore, FileBlockStore};
use crate::transaction::{SignedTx, TX_FEE};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::AccountState;
use super::validation::{is_block_hash_valid, validate_block_linkage};

/// Fixed reward credited to the miner of every block.
pub const BLOCK_REWARD: u64 = 100;

/// Placeholder miner credited for blocks built by `Ledger::persist`.
pub const PLACEHOLDER_MINER: Address = Address::from_bytes([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9,
]);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub parent: Hash,
    pub number: u64,
    /// Difficulty nonce searched by the miner.
    pub nonce: u32,
    pub time: u64,
    pub miner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(rename = "payload")]
    pub transactions: Vec<SignedTx>,
}

impl Block {
    pub fn new(parent: Hash, number: u64, miner: Address, transactions: Vec<SignedTx>) -> Self {
        Block {
            header: BlockHeader {
                parent,
                number,
                nonce: rand::random::<u32>(),
                time: chrono::Utc::now().timestamp() as u64,
                miner,
            },
            transactions,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn hash(&self) -> Result<Hash> {
        Ok(Hash::digest(&self.encode()?))
    }

    /// Sum of the gas component over every transaction in the block.
    /// `None` when it overflows.
    pub fn gas_reward(&self) -> Option<u64> {
        self.transactions
            .iter()
            .try_fold(0u64, |acc, tx| acc.checked_add(tx.gas_cost()?))
    }

    /// Fees the miner collects on top of `BLOCK_REWARD`: the gas reward once
    /// the fork is active, otherwise `TX_FEE` per transaction.
    pub fn fee_reward(&self, fork_active: bool) -> Option<u64> {
        if fork_active {
            self.gas_reward()
        } else {
            (self.transactions.len() as u64).checked_mul(TX_FEE)
        }
    }
}

/// One line of the block log.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockRecord {
    pub hash: Hash,
    pub block: Block,
}

/// Ledger handle for hosts with concurrent callers: queries take the read
/// lock, every mutation the write lock.
pub type SharedLedger = Arc<RwLock<Ledger>>;

/// Account ledger rebuilt from genesis plus the block log.
///
/// `committed` is the state at the head block; `pending` is `committed` with
/// every mempool transaction applied on top.
pub struct Ledger {
    committed: AccountState,
    pending: AccountState,
    mempool: Mempool,
    log: Box<dyn BlockStore>,
    latest_block: Option<Block>,
    latest_block_hash: Hash,
    mining_difficulty: u32,
    fork_tip_1: u64,
    symbol: String,
    hash_index: HashMap<Hash, u64>,
    height_index: HashMap<u64, u64>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("symbol", &self.symbol)
            .field("head", &self.latest_block_hash)
            .field("next_block_number", &self.next_block_number())
            .field("mempool", &self.mempool.len())
            .field("mining_difficulty", &self.mining_difficulty)
            .finish()
    }
}

impl Ledger {
    /// Opens an initialized data directory and replays its block log.
    pub fn new_from_disk(data_dir: &Path, mining_difficulty: u32) -> Result<Self> {
        let genesis_path = genesis_file_path(data_dir);
        if !genesis_path.exists() {
            return Err(ChainError::Config(format!(
                "data directory {} is not initialized",
                data_dir.display()
            )));
        }

        let genesis = Genesis::load(&genesis_path)?;
        let log = FileBlockStore::open(&blocks_db_file_path(data_dir))?;
        Self::with_store(&genesis, Box::new(log), mining_difficulty)
    }

    /// Replays every record of `log` on top of `genesis`. Any failure aborts.
    pub fn with_store(genesis: &Genesis, mut log: Box<dyn BlockStore>, mining_difficulty: u32) -> Result<Self> {
        let records = log.read_records()?;

        let mut ledger = Ledger {
            committed: AccountState::from_genesis(genesis),
            pending: AccountState::new(),
            mempool: Mempool::new(),
            log,
            latest_block: None,
            latest_block_hash: Hash::default(),
            mining_difficulty,
            fork_tip_1: genesis.fork_tip_1,
            symbol: genesis.symbol.clone(),
            hash_index: HashMap::new(),
            height_index: HashMap::new(),
        };

        info!("Replaying {} blocks (difficulty {})", records.len(), mining_difficulty);

        for stored in records {
            let record: BlockRecord = serde_json::from_str(&stored.line).map_err(|e| {
                ChainError::Format(format!("Malformed block record at offset {}: {}", stored.offset, e))
            })?;

            let (hash, state) = ledger.validate_and_apply_block(&record.block)?;
            if hash != record.hash {
                return Err(ValidationError::RecordHashMismatch {
                    stored: record.hash,
                    computed: hash,
                }
                .into());
            }

            debug!("Replayed block {} {}", record.block.header.number, hash);
            ledger.commit(record.block, hash, state, stored.offset);
        }

        ledger.pending = ledger.committed.clone();
        info!(
            "Ledger ready at block {} ({})",
            ledger.latest_block.as_ref().map_or(0, |b| b.header.number),
            ledger.latest_block_hash
        );
        Ok(ledger)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Balance including the effect of pending transactions.
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.pending.balance_of(address)
    }

    /// Last nonce used by `address`, 0 if it never sent.
    pub fn nonce_of(&self, address: &Address) -> u64 {
        self.pending.nonce_of(address)
    }

    pub fn next_nonce_of(&self, address: &Address) -> u64 {
        self.pending.next_nonce_of(address)
    }

    pub fn balances(&self) -> &HashMap<Address, u64> {
        &self.pending.balances
    }

    pub fn nonces(&self) -> &HashMap<Address, u64> {
        &self.pending.nonces
    }

    /// State at the head block, without pending transactions.
    pub fn committed_state(&self) -> &AccountState {
        &self.committed
    }

    pub fn pending_transactions(&self) -> &[SignedTx] {
        self.mempool.transactions()
    }

    pub fn has_blocks(&self) -> bool {
        self.latest_block.is_some()
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.latest_block.as_ref()
    }

    pub fn head_hash(&self) -> Hash {
        self.latest_block_hash
    }

    pub fn head_number(&self) -> Option<u64> {
        self.latest_block.as_ref().map(|b| b.header.number)
    }

    pub fn next_block_number(&self) -> u64 {
        self.latest_block
            .as_ref()
            .map_or(0, |b| b.header.number + 1)
    }

    /// True when the next block is at or past the fork activation height.
    pub fn is_fork_active(&self) -> bool {
        self.next_block_number() >= self.fork_tip_1
    }

    pub fn fork_tip_1(&self) -> u64 {
        self.fork_tip_1
    }

    pub fn mining_difficulty(&self) -> u32 {
        self.mining_difficulty
    }

    pub fn change_mining_difficulty(&mut self, difficulty: u32) {
        self.mining_difficulty = difficulty;
    }

    pub fn block_offset_by_hash(&self, hash: &Hash) -> Option<u64> {
        self.hash_index.get(hash).copied()
    }

    pub fn block_offset_by_height(&self, number: u64) -> Option<u64> {
        self.height_index.get(&number).copied()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validates `tx` against the pending state, applies it and queues it.
    pub fn accept_transaction(&mut self, tx: SignedTx) -> Result<()> {
        let fork_active = self.is_fork_active();
        self.pending.apply_transaction(&tx, fork_active)?;
        self.mempool.push(tx);
        Ok(())
    }

    /// Validates an externally built block against the head, appends it to
    /// the log and re-applies the mempool on the new head.
    pub fn accept_block(&mut self, block: Block) -> Result<Hash> {
        let (hash, state) = self.validate_and_apply_block(&block)?;
        let offset = self.append_record(&block, hash)?;
        self.commit(block, hash, state, offset);
        self.rebuild_pending();
        Ok(hash)
    }

    /// Accepts blocks in order, stopping at the first failure.
    pub fn accept_blocks<I: IntoIterator<Item = Block>>(&mut self, blocks: I) -> Result<Vec<Hash>> {
        blocks.into_iter().map(|b| self.accept_block(b)).collect()
    }

    /// Seals the mempool into a block credited to `PLACEHOLDER_MINER`, mines
    /// it, runs it through the block gate and appends it to the log.
    ///
    /// On failure nothing changes and the mempool stays pending.
    pub fn persist(&mut self) -> Result<Hash> {
        let candidate = Block::new(
            self.latest_block_hash,
            self.next_block_number(),
            PLACEHOLDER_MINER,
            self.mempool.transactions().to_vec(),
        );
        let (block, _) = mine_block(candidate, self.mining_difficulty, DEFAULT_MAX_ATTEMPTS)?;

        let (hash, state) = self.validate_and_apply_block(&block)?;
        let offset = self.append_record(&block, hash)?;

        info!(
            "Persisted block {} with {} transactions: {}",
            block.header.number,
            block.transactions.len(),
            hash
        );

        self.commit(block, hash, state, offset);
        self.mempool.clear();
        self.pending = self.committed.clone();
        Ok(hash)
    }

    /// Syncs the log and releases it.
    pub fn close(mut self) -> Result<()> {
        self.log.sync()?;
        info!("Closed ledger at {}", self.latest_block_hash);
        Ok(())
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Runs every block rule against the committed state and returns the
    /// block hash plus the resulting state. `self` is not modified.
    fn validate_and_apply_block(&self, block: &Block) -> Result<(Hash, AccountState)> {
        let head = self.latest_block.as_ref().map(|b| (b, &self.latest_block_hash));
        validate_block_linkage(block, head)?;

        let hash = block.hash()?;
        if !is_block_hash_valid(&hash, self.mining_difficulty) {
            return Err(ValidationError::Difficulty {
                hash,
                difficulty: self.mining_difficulty,
            }
            .into());
        }

        let fork_active = self.is_fork_active();
        let mut state = self.committed.clone();

        // sort_by_key is stable: equal timestamps keep payload order
        let mut ordered: Vec<&SignedTx> = block.transactions.iter().collect();
        ordered.sort_by_key(|tx| tx.time());
        for tx in ordered {
            state.apply_transaction(tx, fork_active)?;
        }

        let miner = block.header.miner;
        let reward = block
            .fee_reward(fork_active)
            .and_then(|fees| BLOCK_REWARD.checked_add(fees))
            .ok_or(ValidationError::RewardOverflow { miner })?;
        state.credit(miner, reward)?;

        Ok((hash, state))
    }

    fn append_record(&mut self, block: &Block, hash: Hash) -> Result<u64> {
        let record = BlockRecord {
            hash,
            block: block.clone(),
        };
        let line = serde_json::to_string(&record)?;
        self.log.append(&line)
    }

    fn commit(&mut self, block: Block, hash: Hash, state: AccountState, offset: u64) {
        self.hash_index.insert(hash, offset);
        self.height_index.insert(block.header.number, offset);
        self.committed = state;
        self.latest_block = Some(block);
        self.latest_block_hash = hash;
    }

    fn rebuild_pending(&mut self) {
        let fork_active = self.is_fork_active();
        let mut pending = self.committed.clone();

        self.mempool.retain(|tx| match pending.apply_transaction(tx, fork_active) {
            Ok(()) => true,
            Err(e) => {
                warn!("Evicting pending transaction from {}: {}", tx.from(), e);
                false
            }
        });

        self.pending = pending;
    }
}
