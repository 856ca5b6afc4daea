//! File and block records

use crate::node::NodeRegistry;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use tidefs_common::BlockAssign;
use tidefs_placement::ReplicaRing;
use tidefs_traffic::DecayCounter;

/// A block and the ring of nodes holding its replicas
#[derive(Clone, Debug)]
pub struct BlockRecord {
    pub id: String,
    pub ring: ReplicaRing,
}

impl BlockRecord {
    #[must_use]
    pub const fn new(id: String, ring: ReplicaRing) -> Self {
        Self { id, ring }
    }

    /// Assignment listing every replica of this block
    #[must_use]
    pub fn assignment(&self, registry: &NodeRegistry) -> BlockAssign {
        BlockAssign {
            block_id: self.id.clone(),
            replicas: self
                .ring
                .members()
                .filter_map(|node| registry.get(node).map(|n| n.address().to_string()))
                .collect(),
        }
    }
}

/// Read temperature of a file
#[derive(Debug)]
pub struct FileTraffic {
    pub counter: DecayCounter,
    /// Value of this file currently held by the running median
    pub reported: f64,
}

impl FileTraffic {
    #[must_use]
    pub fn new(half_life_secs: f64) -> Self {
        Self {
            counter: DecayCounter::new(half_life_secs),
            reported: 0.0,
        }
    }
}

/// Metadata of one file
#[derive(Debug)]
pub struct FileRecord {
    name: String,
    size: u64,
    replication_factor: u64,
    /// Replicas every block is meant to have, at most the node count
    actual_replicas: AtomicUsize,
    blocks: RwLock<Vec<BlockRecord>>,
    traffic: Mutex<FileTraffic>,
}

impl FileRecord {
    #[must_use]
    pub fn new(
        name: String,
        size: u64,
        replication_factor: u64,
        actual_replicas: usize,
        blocks: Vec<BlockRecord>,
        traffic: FileTraffic,
    ) -> Self {
        Self {
            name,
            size,
            replication_factor,
            actual_replicas: AtomicUsize::new(actual_replicas),
            blocks: RwLock::new(blocks),
            traffic: Mutex::new(traffic),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bytes
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Replication factor the client asked for
    #[must_use]
    pub const fn replication_factor(&self) -> u64 {
        self.replication_factor
    }

    #[must_use]
    pub fn actual_replicas(&self) -> usize {
        self.actual_replicas.load(Ordering::Acquire)
    }

    pub fn set_actual_replicas(&self, replicas: usize) {
        self.actual_replicas.store(replicas, Ordering::Release);
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn blocks(&self) -> RwLockReadGuard<'_, Vec<BlockRecord>> {
        self.blocks.read()
    }

    pub fn blocks_mut(&self) -> RwLockWriteGuard<'_, Vec<BlockRecord>> {
        self.blocks.write()
    }

    pub fn traffic(&self) -> MutexGuard<'_, FileTraffic> {
        self.traffic.lock()
    }

    /// Current (decayed) read temperature
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.traffic.lock().counter.get()
    }

    /// Every block with every replica
    #[must_use]
    pub fn assignments(&self, registry: &NodeRegistry) -> Vec<BlockAssign> {
        self.blocks
            .read()
            .iter()
            .map(|block| block.assignment(registry))
            .collect()
    }
}
