//! Block store of a storage node

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tidefs_client::{BlockStorage, StorageConn};
use tidefs_common::{Error, Result};
use tracing::debug;

/// In-memory storage node
#[derive(Default)]
pub struct Storage {
    blocks: DashMap<String, Bytes>,
    /// Connections to other storage nodes, by address
    peers: DashMap<String, Arc<dyn BlockStorage>>,
}

impl Storage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send replication traffic for `address` through `conn`
    pub fn add_peer(&self, address: impl Into<String>, conn: Arc<dyn BlockStorage>) {
        self.peers.insert(address.into(), conn);
    }

    /// Connection to the peer at `address`, opened on first use
    fn peer(&self, address: &str) -> Result<Arc<dyn BlockStorage>> {
        if let Some(conn) = self.peers.get(address) {
            return Ok(Arc::clone(conn.value()));
        }
        let conn: Arc<dyn BlockStorage> = Arc::new(StorageConn::new(address)?);
        Ok(Arc::clone(
            self.peers.entry(address.to_string()).or_insert(conn).value(),
        ))
    }

    /// Number of blocks held
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn contains(&self, block_id: &str) -> bool {
        self.blocks.contains_key(block_id)
    }

    fn block(&self, block_id: &str) -> Result<Bytes> {
        self.blocks
            .get(block_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::BlockNotFound {
                block_id: block_id.to_string(),
            })
    }
}

#[async_trait]
impl BlockStorage for Storage {
    async fn set(&self, block_id: &str, data: Bytes) -> Result<()> {
        debug!(block_id, len = data.len(), "set block");
        self.blocks.insert(block_id.to_string(), data);
        Ok(())
    }

    async fn get(&self, block_id: &str) -> Result<Bytes> {
        self.block(block_id)
    }

    async fn unset(&self, block_id: &str) -> Result<()> {
        debug!(block_id, "unset block");
        self.blocks
            .remove(block_id)
            .map(|_| ())
            .ok_or_else(|| Error::BlockNotFound {
                block_id: block_id.to_string(),
            })
    }

    async fn replicate(&self, block_id: &str, destination: &str) -> Result<()> {
        let data = self.block(block_id)?;
        let peer = self.peer(destination)?;
        peer.set(block_id, data)
            .await
            .map_err(|e| Error::remote(format!("copy {block_id} to {destination}: {e}")))?;
        debug!(block_id, destination, "replicated block");
        Ok(())
    }
}
