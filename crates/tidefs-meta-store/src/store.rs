//! File namespace of the master

use crate::file::{BlockRecord, FileRecord, FileTraffic};
use crate::node::NodeRegistry;
use crate::traffic::TrafficMonitor;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tidefs_common::{
    BlockAssign, Config, CreateRequest, Error, FileBlocks, MAX_REPLICATION_FACTOR, Result,
    block_count, block_id,
};
use tidefs_placement::PlacementEngine;
use tracing::{debug, info};

/// Files, their blocks, and where the replicas live
pub struct MetadataStore {
    block_size: u64,
    half_life_secs: f64,
    files: DashMap<String, Arc<FileRecord>>,
    registry: Arc<NodeRegistry>,
    placement: PlacementEngine,
    traffic: TrafficMonitor,
}

impl MetadataStore {
    /// Create an empty store over `registry`
    ///
    /// Spawns the traffic worker, so it must be called from within a Tokio
    /// runtime.
    #[must_use]
    pub fn new(config: &Config, registry: Arc<NodeRegistry>) -> Self {
        let placement = PlacementEngine::from_config(&config.master, &registry.addresses());
        Self {
            block_size: config.block_size,
            half_life_secs: config.master.traffic_half_life_secs,
            files: DashMap::new(),
            registry,
            placement,
            traffic: TrafficMonitor::spawn(config.master.traffic_queue_depth),
        }
    }

    /// Register a new file and assign replicas to its blocks
    ///
    /// Exactly one of several concurrent creates of the same name succeeds;
    /// the others get `FileAlreadyExists`.
    pub fn create(&self, request: &CreateRequest) -> Result<Vec<BlockAssign>> {
        if request.replication_factor > MAX_REPLICATION_FACTOR {
            return Err(Error::invalid_argument(format!(
                "replication factor {} exceeds {MAX_REPLICATION_FACTOR}",
                request.replication_factor
            )));
        }

        let name = &request.name;
        // skip placement for names that are already taken
        if self.files.contains_key(name) {
            return Err(Error::FileAlreadyExists(name.clone()));
        }

        // Placement runs before the entry is locked so that lookups hashing
        // to the same shard do not wait on it. A create that still loses
        // the race below has moved the hand for nothing, which only shifts
        // where the next file starts.
        let ids: Vec<String> = (0..block_count(request.size, self.block_size))
            .map(|index| block_id(name, index))
            .collect();
        let rings = self.placement.place(&ids, request.replication_factor);
        let blocks: Vec<BlockRecord> = ids
            .into_iter()
            .zip(rings)
            .map(|(id, ring)| BlockRecord::new(id, ring))
            .collect();
        let replicas = usize::try_from(request.replication_factor)
            .unwrap_or(usize::MAX)
            .min(self.registry.len());
        let record = Arc::new(FileRecord::new(
            name.clone(),
            request.size,
            request.replication_factor,
            replicas,
            blocks,
            FileTraffic::new(self.half_life_secs),
        ));
        let assignments = record.assignments(&self.registry);

        let slot = match self.files.entry(name.clone()) {
            Entry::Occupied(_) => return Err(Error::FileAlreadyExists(name.clone())),
            Entry::Vacant(slot) => slot,
        };
        for block in record.blocks().iter() {
            for node in block.ring.members() {
                self.registry.node(node)?.record_block(name, &block.id);
            }
        }
        // the median must know the file before anyone can look it up
        self.traffic.register(0.0);
        slot.insert(record);

        info!(
            name = %name,
            size = request.size,
            blocks = assignments.len(),
            replicas,
            "file created"
        );
        Ok(assignments)
    }

    /// One random read replica per block of `name`, and a recorded hit
    pub fn lookup(&self, name: &str) -> Result<FileBlocks> {
        let record = self
            .get(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        let assignments = record
            .blocks()
            .iter()
            .map(|block| BlockAssign {
                block_id: block.id.clone(),
                replicas: self
                    .placement
                    .pick_read_replica(&block.ring)
                    .and_then(|node| self.registry.get(node))
                    .map(|node| vec![node.address().to_string()])
                    .unwrap_or_default(),
            })
            .collect();

        self.traffic.record_hit(Arc::clone(&record));
        debug!(name, "file looked up");

        Ok(FileBlocks {
            file_size: record.size(),
            assignments,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<FileRecord>> {
        self.files.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every file record
    #[must_use]
    pub fn files(&self) -> Vec<Arc<FileRecord>> {
        self.files
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn placement(&self) -> &PlacementEngine {
        &self.placement
    }

    #[must_use]
    pub const fn traffic(&self) -> &TrafficMonitor {
        &self.traffic
    }
}
