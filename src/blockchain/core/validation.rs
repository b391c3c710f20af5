use crate::crypto::Hash;
use crate::error::ValidationError;

use super::chain::Block;

/// Difficulty predicate on the hex form of `hash`: the first `difficulty`
/// nibbles must be `0` and the nibble right after them must not be.
pub fn is_block_hash_valid(hash: &Hash, difficulty: u32) -> bool {
    let hex = hash.to_hex();
    let digits = hex.as_bytes();
    let difficulty = difficulty as usize;

    if difficulty >= digits.len() {
        return false;
    }

    digits[..difficulty].iter().all(|d| *d == b'0') && digits[difficulty] != b'0'
}

/// Chain continuity against the current head. Without a head (no block
/// applied yet) any number and parent are accepted.
pub fn validate_block_linkage(
    block: &Block,
    head: Option<(&Block, &Hash)>,
) -> Result<(), ValidationError> {
    let Some((latest, latest_hash)) = head else {
        return Ok(());
    };

    let expected = latest.header.number + 1;
    if block.header.number != expected {
        return Err(ValidationError::BlockNumber {
            expected,
            got: block.header.number,
        });
    }

    if block.header.parent != *latest_hash {
        return Err(ValidationError::ParentHash {
            expected: *latest_hash,
            got: block.header.parent,
        });
    }

    Ok(())
}
