//! The two independent string hashes behind Maglev offsets and skips

use xxhash_rust::xxh64::{Xxh64, xxh64};

/// xxHash64 of `key`, with the first digest fed back through the hasher
#[must_use]
pub fn hash_mixed(key: &str) -> u64 {
    let first = xxh64(key.as_bytes(), 0);
    let mut hasher = Xxh64::new(0);
    hasher.update(key.as_bytes());
    hasher.update(&first.to_le_bytes());
    hasher.digest()
}

/// CRC32C of `key`
#[must_use]
pub fn hash_crc(key: &str) -> u64 {
    u64::from(crc32c::crc32c(key.as_bytes()))
}

/// Hash used to pick a replica permutation for a block
#[must_use]
pub fn hash_block(block_id: &str) -> u64 {
    xxh64(block_id.as_bytes(), 0)
}
