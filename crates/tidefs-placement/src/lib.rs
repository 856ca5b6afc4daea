//! tidefs Placement - where blocks and their replicas live
//!
//! Storage nodes are addressed by their index in the master's fixed node
//! list. A block's replicas occupy consecutive positions of a
//! [`ReplicaRing`]: the first replica comes from the block placement policy
//! and the rest follow the replica placement policy.
//!
//! # Policies
//!
//! ## Block placement
//! - **Round robin**: a CLOCK hand sweeps the node indices.
//! - **Permutation**: the hand sweeps a Maglev lookup table instead, so the
//!   first replicas follow a consistent-hashing spread of the nodes.
//!
//! ## Replica placement
//! - **Round robin**: replicas sit on consecutive node indices.
//! - **Permutation**: replicas sit on consecutive positions of one of a pool
//!   of random permutations, selected by hashing the block id.

pub mod engine;
pub mod hashing;
pub mod maglev;
pub mod permutation;
pub mod primes;
pub mod ring;

pub use engine::{BlockPlacement, PlacementEngine, ReplicaPlacement};
pub use maglev::MaglevTable;
pub use permutation::ReplicaPermutations;
pub use primes::{next_prime_of, primes_until};
pub use ring::ReplicaRing;
