//! Master façade
//!
//! Owns the configuration, the storage node registry, the metadata store and
//! the balancer, and exposes the client-facing create and lookup calls.

use crate::balancer::Balancer;
use std::sync::Arc;
use tidefs_common::{BlockAssign, Config, CreateRequest, FileBlocks, Result};
use tidefs_meta_store::{MetadataStore, NodeRegistry};
use tokio::task::JoinHandle;
use tracing::info;

pub struct Master {
    config: Arc<Config>,
    store: Arc<MetadataStore>,
    balancer: Arc<Balancer>,
}

impl Master {
    /// Wire a master over an existing registry
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: Config, registry: NodeRegistry) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(MetadataStore::new(&config, Arc::new(registry)));
        let balancer = Arc::new(Balancer::new(Arc::clone(&store)));
        Self {
            config,
            store,
            balancer,
        }
    }

    /// Master talking HTTP to the configured storage nodes
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let registry = NodeRegistry::connect(&config.master.storages)?;
        info!(
            storages = registry.len(),
            block_size = config.block_size,
            "Master configured"
        );
        Ok(Self::new(config, registry))
    }

    /// Register `request.name` and return where its blocks go
    pub fn create(&self, request: &CreateRequest) -> Result<Vec<BlockAssign>> {
        self.store.create(request)
    }

    /// One read replica per block of `name`
    pub fn lookup(&self, name: &str) -> Result<FileBlocks> {
        self.store.lookup(name)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    #[must_use]
    pub const fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    /// Start the periodic balancer if dynamic replication is enabled
    pub fn spawn_background(&self) -> Option<JoinHandle<()>> {
        if !self.config.master.dynamic_replication {
            info!("Dynamic replication disabled");
            return None;
        }
        let interval = self.config.master.rebalance_interval();
        info!("Balancer running every {:?}", interval);
        Some(tokio::spawn(Arc::clone(&self.balancer).run(interval)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidefs_common::Error;

    #[tokio::test]
    async fn test_connect_validates_config() {
        let mut config = Config::default();
        config.master.storages = vec!["127.0.0.1:9200".to_string(), "127.0.0.1:9200".to_string()];
        assert!(matches!(
            Master::connect(config.clone()),
            Err(Error::Configuration(_))
        ));

        config.master.storages.pop();
        config.block_size = 0;
        assert!(matches!(
            Master::connect(config),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let mut config = Config {
            block_size: 10,
            ..Config::default()
        };
        config.master.storages = (0..3).map(|i| format!("127.0.0.1:{}", 9200 + i)).collect();
        config.master.dynamic_replication = false;
        let master = Master::connect(config).unwrap();

        let assignments = master
            .create(&CreateRequest {
                name: "f".to_string(),
                size: 25,
                replication_factor: 3,
            })
            .unwrap();
        assert_eq!(assignments.len(), 3);
        assert!(assignments.iter().all(|a| a.replicas.len() == 3));

        let file = master.lookup("f").unwrap();
        assert_eq!(file.file_size, 25);
        assert_eq!(file.assignments.len(), 3);
        assert!(master.spawn_background().is_none());
    }
}
