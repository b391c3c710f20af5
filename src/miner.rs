//! Difficulty-nonce search for self-authored blocks.

use crate::blockchain::{is_block_hash_valid, Block};
use crate::crypto::Hash;
use crate::error::{ChainError, Result};
use tracing::debug;

/// Enough attempts to walk the whole difficulty-nonce space once.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 1 << 32;

/// Bumps the header nonce until the block hash satisfies `difficulty`.
pub fn mine_block(mut block: Block, difficulty: u32, max_attempts: u64) -> Result<(Block, Hash)> {
    if difficulty >= 64 {
        return Err(ChainError::MiningExhausted {
            attempts: 0,
            difficulty,
        });
    }

    for attempt in 0..max_attempts {
        let hash = block.hash()?;
        if is_block_hash_valid(&hash, difficulty) {
            debug!(
                "Mined block {} after {} attempts: {}",
                block.header.number,
                attempt + 1,
                hash
            );
            return Ok((block, hash));
        }
        block.header.nonce = block.header.nonce.wrapping_add(1);
    }

    Err(ChainError::MiningExhausted {
        attempts: max_attempts,
        difficulty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Address;

    #[test]
    fn test_mined_block_satisfies_predicate() {
        let block = Block::new(Hash::default(), 0, Address::default(), vec![]);
        let (mined, hash) = mine_block(block, 2, DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(mined.hash().unwrap(), hash);
        assert!(is_block_hash_valid(&hash, 2));
        assert!(hash.to_hex().starts_with("00"));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let block = Block::new(Hash::default(), 0, Address::default(), vec![]);
        let err = mine_block(block, 12, 3).unwrap_err();
        assert_eq!(
            err,
            ChainError::MiningExhausted {
                attempts: 3,
                difficulty: 12
            }
        );
    }

    #[test]
    fn test_impossible_difficulty_fails_fast() {
        let block = Block::new(Hash::default(), 0, Address::default(), vec![]);
        assert!(mine_block(block, 64, DEFAULT_MAX_ATTEMPTS).is_err());
    }
}
