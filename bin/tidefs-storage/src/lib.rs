//! tidefs Storage - in-memory block storage node
//!
//! A storage node keeps whole blocks keyed by block id and serves them over
//! HTTP. It knows nothing about files; the master decides which node holds
//! which block and asks nodes to copy blocks to each other.

pub mod service;
pub mod storage;

pub use service::router;
pub use storage::Storage;
