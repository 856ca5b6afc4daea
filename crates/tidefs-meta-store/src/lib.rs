//! tidefs Metadata Store - the master's view of files, blocks and nodes
//!
//! Everything lives in memory and is rebuilt from scratch on restart. Files
//! are created once and never deleted; only the balancer changes a file's
//! replica count and its blocks' replica rings after creation.

pub mod file;
pub mod node;
pub mod store;
pub mod traffic;

pub use file::{BlockRecord, FileRecord, FileTraffic};
pub use node::{NodeRegistry, StorageNode};
pub use store::MetadataStore;
pub use traffic::{TrafficEvent, TrafficMonitor};
