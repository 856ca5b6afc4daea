//! tidefs Client - RPC clients for inter-service communication
//!
//! - [`StorageConn`]: a storage node, behind the [`BlockStorage`] trait
//! - [`MasterConn`]: the master's create and lookup calls
//! - [`Client`]: whole-file create and read on top of both

pub mod client;
pub mod master;
pub mod rpc;
pub mod storage;

pub use client::Client;
pub use master::MasterConn;
pub use rpc::RpcClient;
pub use storage::{BlockStorage, StorageConn};
