//! Storage node registry
//!
//! The node list is fixed at startup. Replica rings refer to nodes by their
//! index in this registry.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tidefs_client::{BlockStorage, StorageConn};
use tidefs_common::{Error, Result};

/// A storage node as seen by the master
pub struct StorageNode {
    address: String,
    conn: Arc<dyn BlockStorage>,
    /// Blocks this node holds, by file name
    stored: Mutex<HashMap<String, HashSet<String>>>,
}

impl StorageNode {
    #[must_use]
    pub fn new(address: impl Into<String>, conn: Arc<dyn BlockStorage>) -> Self {
        Self {
            address: address.into(),
            conn,
            stored: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connection used for block RPCs to this node
    #[must_use]
    pub const fn conn(&self) -> &Arc<dyn BlockStorage> {
        &self.conn
    }

    pub fn record_block(&self, file: &str, block_id: &str) {
        self.stored
            .lock()
            .entry(file.to_string())
            .or_default()
            .insert(block_id.to_string());
    }

    pub fn forget_block(&self, file: &str, block_id: &str) {
        let mut stored = self.stored.lock();
        if let Some(blocks) = stored.get_mut(file) {
            blocks.remove(block_id);
            if blocks.is_empty() {
                stored.remove(file);
            }
        }
    }

    #[must_use]
    pub fn holds_block(&self, file: &str, block_id: &str) -> bool {
        self.stored
            .lock()
            .get(file)
            .is_some_and(|blocks| blocks.contains(block_id))
    }

    /// Number of blocks of `file` on this node
    #[must_use]
    pub fn block_count(&self, file: &str) -> usize {
        self.stored.lock().get(file).map_or(0, HashSet::len)
    }
}

impl std::fmt::Debug for StorageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageNode")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// The fixed set of storage nodes
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Vec<Arc<StorageNode>>,
    by_address: HashMap<String, usize>,
}

impl NodeRegistry {
    /// Registry over the given connections, in order
    pub fn new(nodes: Vec<(String, Arc<dyn BlockStorage>)>) -> Result<Self> {
        let mut registry = Self::default();
        for (address, conn) in nodes {
            if registry.by_address.contains_key(&address) {
                return Err(Error::configuration(format!(
                    "storage node listed twice: {address}"
                )));
            }
            registry
                .by_address
                .insert(address.clone(), registry.nodes.len());
            registry.nodes.push(Arc::new(StorageNode::new(address, conn)));
        }
        Ok(registry)
    }

    /// Registry with one HTTP connection per address
    pub fn connect(addresses: &[String]) -> Result<Self> {
        let nodes = addresses
            .iter()
            .map(|address| {
                let conn: Arc<dyn BlockStorage> = Arc::new(StorageConn::new(address.clone())?);
                Ok((address.clone(), conn))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(nodes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<StorageNode>> {
        self.nodes.get(index)
    }

    #[must_use]
    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.by_address.get(address).copied()
    }

    /// Node at `index`, or `NodeNotFound`
    pub fn node(&self, index: usize) -> Result<&Arc<StorageNode>> {
        self.get(index)
            .ok_or_else(|| Error::NodeNotFound(format!("#{index}")))
    }

    /// Node addresses in index order
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.address.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StorageNode>> {
        self.nodes.iter()
    }
}
