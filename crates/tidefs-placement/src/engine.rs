//! Placement engine: replica rings for newly created blocks

use crate::maglev::MaglevTable;
use crate::permutation::ReplicaPermutations;
use crate::ring::ReplicaRing;
use parking_lot::Mutex;
use rand::Rng;
use tidefs_common::config::MasterConfig;
use tidefs_common::{BlockPlacementPolicy, ClockAdvance, ReplicaPlacementPolicy};

/// Choice of the first replica of each block
#[derive(Debug)]
pub enum BlockPlacement {
    /// CLOCK hand over node indices
    RoundRobin { advance: ClockAdvance },
    /// Hand over the slots of a Maglev table
    Permutation(MaglevTable),
}

/// Layout of the remaining replicas of a block
#[derive(Debug)]
pub enum ReplicaPlacement {
    RoundRobin,
    Permutation(ReplicaPermutations),
}

/// Block and replica placement over a fixed list of storage nodes
#[derive(Debug)]
pub struct PlacementEngine {
    nodes: usize,
    block: BlockPlacement,
    replica: ReplicaPlacement,
    /// Position of the CLOCK hand, in node indices or Maglev slots
    hand: Mutex<usize>,
}

impl PlacementEngine {
    #[must_use]
    pub fn new(nodes: usize, block: BlockPlacement, replica: ReplicaPlacement) -> Self {
        Self {
            nodes,
            block,
            replica,
            hand: Mutex::new(0),
        }
    }

    /// Build the engine the master configuration asks for, over `node_names`
    #[must_use]
    pub fn from_config<S: AsRef<str>>(config: &MasterConfig, node_names: &[S]) -> Self {
        let block = match config.block_placement {
            BlockPlacementPolicy::RoundRobin => BlockPlacement::RoundRobin {
                advance: config.clock_advance,
            },
            BlockPlacementPolicy::Permutation => BlockPlacement::Permutation(MaglevTable::build(
                config.maglev_multiplier,
                node_names,
            )),
        };
        let replica = match config.replica_placement {
            ReplicaPlacementPolicy::RoundRobin => ReplicaPlacement::RoundRobin,
            ReplicaPlacementPolicy::Permutation => {
                ReplicaPlacement::Permutation(ReplicaPermutations::new(
                    node_names.len(),
                    config.permutation_table_size,
                    config.permutation_seed,
                ))
            }
        };
        Self::new(node_names.len(), block, replica)
    }

    /// Number of storage nodes
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes
    }

    /// Current hand position
    #[must_use]
    pub fn hand(&self) -> usize {
        *self.hand.lock()
    }

    /// Replica rings for the blocks of a new file
    ///
    /// Each ring holds `min(replication_factor, N)` distinct nodes. Without
    /// nodes every ring is empty and the hand does not move.
    pub fn place(&self, block_ids: &[String], replication_factor: u64) -> Vec<ReplicaRing> {
        if self.nodes == 0 {
            return block_ids.iter().map(|_| ReplicaRing::empty()).collect();
        }

        let replicas = usize::try_from(replication_factor)
            .unwrap_or(usize::MAX)
            .min(self.nodes);
        let starts = self.first_replicas(block_ids.len(), replicas);

        block_ids
            .iter()
            .zip(starts)
            .map(|(block_id, start)| match &self.replica {
                ReplicaPlacement::RoundRobin => {
                    ReplicaRing::sequential(self.nodes, start, replicas)
                }
                ReplicaPlacement::Permutation(pool) => {
                    let (perm, position) = pool.select(block_id, start);
                    ReplicaRing::permuted(perm, position, replicas)
                }
            })
            .collect()
    }

    /// Node index of the first replica of each block, advancing the hand
    fn first_replicas(&self, blocks: usize, replicas: usize) -> Vec<usize> {
        let mut hand = self.hand.lock();
        match &self.block {
            BlockPlacement::RoundRobin { advance } => {
                let step = match advance {
                    ClockAdvance::PerReplica => replicas,
                    ClockAdvance::PerBlock => 1,
                };
                let n = self.nodes;
                let starts = (0..blocks).map(|i| (*hand + (i % n) * step) % n).collect();
                *hand = (*hand + (blocks % n) * step) % n;
                starts
            }
            BlockPlacement::Permutation(table) => {
                let m = table.len();
                let entries = table.entries();
                let starts = (0..blocks).map(|i| entries[(*hand + i % m) % m]).collect();
                *hand = (*hand + blocks % m) % m;
                starts
            }
        }
    }

    /// A uniformly random replica of `ring`
    #[must_use]
    pub fn pick_read_replica(&self, ring: &ReplicaRing) -> Option<usize> {
        if ring.is_empty() {
            return None;
        }
        ring.member(rand::thread_rng().gen_range(0..ring.len()))
    }
}
