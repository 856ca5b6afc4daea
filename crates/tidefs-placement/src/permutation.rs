//! Pool of random node permutations for replica placement

use crate::hashing::hash_block;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;

struct Permutation {
    order: Arc<[usize]>,
    /// `position[node]` is the index of `node` in `order`
    position: Vec<usize>,
}

/// A fixed pool of permutations of `0..N`, shared by every block
pub struct ReplicaPermutations {
    pool: Vec<Permutation>,
}

impl ReplicaPermutations {
    /// Draw `size` random permutations of `0..nodes`
    ///
    /// With a seed the pool is reproducible across restarts.
    #[must_use]
    pub fn new(nodes: usize, size: usize, seed: Option<u64>) -> Self {
        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let pool = (0..size.max(1))
            .map(|_| {
                let mut order: Vec<usize> = (0..nodes).collect();
                order.shuffle(&mut rng);
                let mut position = vec![0; nodes];
                for (i, &node) in order.iter().enumerate() {
                    position[node] = i;
                }
                Permutation {
                    order: order.into(),
                    position,
                }
            })
            .collect();
        Self { pool }
    }

    /// Number of permutations in the pool
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Permutation assigned to `block_id`, and the position of `node` in it
    #[must_use]
    pub fn select(&self, block_id: &str, node: usize) -> (Arc<[usize]>, usize) {
        let index = (hash_block(block_id) % self.pool.len() as u64) as usize;
        let perm = &self.pool[index];
        let start = perm.position.get(node).copied().unwrap_or(0);
        (Arc::clone(&perm.order), start)
    }
}

impl std::fmt::Debug for ReplicaPermutations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaPermutations")
            .field("pool", &self.pool.len())
            .finish()
    }
}
