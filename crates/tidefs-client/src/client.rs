//! File client: whole-file create and read
//!
//! The master only hands out block assignments; block content goes straight
//! between the client and the storage nodes.

use crate::master::MasterConn;
use crate::storage::{BlockStorage, StorageConn};
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::future::try_join_all;
use std::sync::Arc;
use tidefs_common::{CreateRequest, Error, Result, block_count};
use tracing::debug;

/// Client of a tidefs cluster
pub struct Client {
    master: MasterConn,
    block_size: u64,
    /// Storage connections by address, opened on first use
    storages: DashMap<String, Arc<dyn BlockStorage>>,
}

impl Client {
    /// Create a client talking to the master at `master`
    pub fn new(master: impl Into<String>, block_size: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::invalid_argument("block size must be non-zero"));
        }
        Ok(Self {
            master: MasterConn::new(master)?,
            block_size,
            storages: DashMap::new(),
        })
    }

    /// Route requests for `address` through `conn`
    pub fn add_storage(&self, address: impl Into<String>, conn: Arc<dyn BlockStorage>) {
        self.storages.insert(address.into(), conn);
    }

    #[must_use]
    pub const fn master(&self) -> &MasterConn {
        &self.master
    }

    fn storage(&self, address: &str) -> Result<Arc<dyn BlockStorage>> {
        if let Some(conn) = self.storages.get(address) {
            return Ok(Arc::clone(conn.value()));
        }
        let conn: Arc<dyn BlockStorage> = Arc::new(StorageConn::new(address)?);
        Ok(Arc::clone(
            self.storages
                .entry(address.to_string())
                .or_insert(conn)
                .value(),
        ))
    }

    /// Create `name` with `data`, writing every replica of every block
    ///
    /// A non-empty file needs at least one replica, or it could never be read
    /// back.
    pub async fn create(&self, name: &str, data: Bytes, replication_factor: u64) -> Result<()> {
        if replication_factor == 0 && !data.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{name}: replication factor 0 leaves no readable copy"
            )));
        }
        let request = CreateRequest {
            name: name.to_string(),
            size: data.len() as u64,
            replication_factor,
        };
        let assignments = self.master.create(&request).await?;

        let blocks = split_blocks(&data, self.block_size);
        if blocks.len() != assignments.len() {
            return Err(Error::internal(format!(
                "master assigned {} blocks for {name}, expected {}",
                assignments.len(),
                blocks.len()
            )));
        }

        let writes = assignments.iter().zip(blocks).flat_map(|(assign, block)| {
            assign.replicas.iter().map(move |address| {
                let block = block.clone();
                async move {
                    let conn = self.storage(address)?;
                    conn.set(&assign.block_id, block).await
                }
            })
        });
        try_join_all(writes).await?;

        debug!(name, size = request.size, blocks = assignments.len(), "file written");
        Ok(())
    }

    /// Read the whole content of `name`
    pub async fn read(&self, name: &str) -> Result<Bytes> {
        let file = self.master.lookup(name).await?;

        let expected = block_count(file.file_size, self.block_size);
        if file.assignments.len() != expected {
            return Err(Error::internal(format!(
                "master returned {} blocks for {name}, expected {expected}",
                file.assignments.len()
            )));
        }

        let reads = file.assignments.iter().map(|assign| async move {
            let address = assign.replicas.first().ok_or_else(|| {
                Error::internal(format!("block {} has no replica", assign.block_id))
            })?;
            self.storage(address)?.get(&assign.block_id).await
        });
        let blocks = try_join_all(reads).await?;

        let mut content = BytesMut::with_capacity(usize::try_from(file.file_size).unwrap_or(0));
        for block in blocks {
            content.extend_from_slice(&block);
        }
        content.truncate(usize::try_from(file.file_size).unwrap_or(usize::MAX));
        Ok(content.freeze())
    }
}

/// Cut `data` into `block_size` pieces; the last one may be shorter
#[must_use]
pub fn split_blocks(data: &Bytes, block_size: u64) -> Vec<Bytes> {
    let step = usize::try_from(block_size).unwrap_or(usize::MAX).max(1);
    (0..data.len())
        .step_by(step)
        .map(|start| data.slice(start..data.len().min(start.saturating_add(step))))
        .collect()
}
