//! Core type definitions for tidefs
//!
//! Block identifiers and the request/response bodies exchanged between the
//! client, the master and the storage nodes.

use serde::{Deserialize, Serialize};

/// Largest replication factor a client may request
pub const MAX_REPLICATION_FACTOR: u64 = i32::MAX as u64;

/// Stable identifier of the `index`-th block of `name`
#[must_use]
pub fn block_id(name: &str, index: usize) -> String {
    format!("{name}:{index:x}")
}

/// Number of blocks a file of `size` bytes occupies
#[must_use]
pub const fn block_count(size: u64, block_size: u64) -> usize {
    size.div_ceil(block_size) as usize
}

/// Body of a master `create` call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    pub size: u64,
    pub replication_factor: u64,
}

/// A block and the storage nodes holding (or about to hold) it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAssign {
    pub block_id: String,
    /// Storage node addresses
    pub replicas: Vec<String>,
}

/// Reply of a master `lookup` call
///
/// Each assignment carries at most one replica, picked at random from the
/// block's replica set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlocks {
    pub file_size: u64,
    pub assignments: Vec<BlockAssign>,
}

/// Body of a storage node `replicate` call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub block_id: String,
    /// Address of the storage node receiving the copy
    pub destination: String,
}

/// Error body returned by every tidefs HTTP service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
