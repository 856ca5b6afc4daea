//! tidefs Traffic - read temperature accounting
//!
//! The master keeps one [`DecayCounter`] per file and folds every counter
//! into a single [`RunningMedian`]. The balancer compares a file's
//! per-replica temperature against the median to decide whether the file
//! needs one more or one fewer replica.

pub mod decay;
pub mod median;

pub use decay::DecayCounter;
pub use median::RunningMedian;
