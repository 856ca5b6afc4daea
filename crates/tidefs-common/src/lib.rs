//! tidefs Common - Shared types and utilities
//!
//! This crate provides the configuration, error definitions and wire types
//! shared by the master, the storage nodes and the client.

pub mod config;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod types;

pub use config::{BlockPlacementPolicy, ClockAdvance, Config, ReplicaPlacementPolicy};
pub use error::{Error, Result};
pub use types::*;
