//! Configuration types for tidefs
//!
//! The configuration is loaded once at startup (TOML file merged with CLI
//! flags by the binaries) and then handed to the components by reference.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration for tidefs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Block size in bytes (default: 4 MB)
    pub block_size: u64,
    /// Master configuration
    pub master: MasterConfig,
    /// Storage node configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024 * 1024, // 4 MB
            master: MasterConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Reject values the master cannot run with
    pub fn validate(&self) -> Result<()> {
        let master = &self.master;
        if self.block_size == 0 {
            return Err(Error::configuration("block_size must be non-zero"));
        }
        if master.rebalance_interval_secs == 0 {
            return Err(Error::configuration(
                "master.rebalance_interval_secs must be non-zero",
            ));
        }
        if master.maglev_multiplier == 0 {
            return Err(Error::configuration("master.maglev_multiplier must be non-zero"));
        }
        if master.permutation_table_size == 0 {
            return Err(Error::configuration(
                "master.permutation_table_size must be non-zero",
            ));
        }
        if master.traffic_queue_depth == 0 {
            return Err(Error::configuration("master.traffic_queue_depth must be non-zero"));
        }
        // NaN fails this comparison too
        if !(master.traffic_half_life_secs > 0.0) {
            return Err(Error::configuration(format!(
                "master.traffic_half_life_secs must be positive, got {}",
                master.traffic_half_life_secs
            )));
        }
        Ok(())
    }
}

/// Master configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Listen address of the master RPC service
    pub listen: String,
    /// Storage node addresses, fixed for the lifetime of the master
    pub storages: Vec<String>,
    /// Run the periodic balancer
    pub dynamic_replication: bool,
    /// Seconds between two balancer ticks
    pub rebalance_interval_secs: u64,
    /// Half-life of the per-file traffic counters (`inf` disables decay)
    pub traffic_half_life_secs: f64,
    /// Maglev lookup table size multiplier
    pub maglev_multiplier: usize,
    /// Where the first replica of a new block goes
    pub block_placement: BlockPlacementPolicy,
    /// How the remaining replicas of a block are laid out
    pub replica_placement: ReplicaPlacementPolicy,
    /// Number of precomputed permutations for permutation replica placement
    pub permutation_table_size: usize,
    /// Seed for the permutation pool (random if unset)
    pub permutation_seed: Option<u64>,
    /// How far the round-robin hand moves per created file
    pub clock_advance: ClockAdvance,
    /// Capacity of the traffic recording queue
    pub traffic_queue_depth: usize,
}

impl MasterConfig {
    /// Balancer tick interval
    #[must_use]
    pub const fn rebalance_interval(&self) -> Duration {
        Duration::from_secs(self.rebalance_interval_secs)
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9100".to_string(),
            storages: Vec::new(),
            dynamic_replication: true,
            rebalance_interval_secs: 10,
            traffic_half_life_secs: 600.0, // 10 minutes
            maglev_multiplier: 100,
            block_placement: BlockPlacementPolicy::default(),
            replica_placement: ReplicaPlacementPolicy::default(),
            permutation_table_size: 16,
            permutation_seed: None,
            clock_advance: ClockAdvance::default(),
            traffic_queue_depth: 1024,
        }
    }
}

/// Block placement policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPlacementPolicy {
    /// CLOCK hand over storage node indices
    #[default]
    RoundRobin,
    /// Hand over a Maglev consistent hashing table
    Permutation,
}

/// Replica placement policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaPlacementPolicy {
    /// Consecutive storage nodes after the first replica
    #[default]
    RoundRobin,
    /// Consecutive positions of a per-block random permutation
    Permutation,
}

/// Amount the round-robin hand advances for each created file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockAdvance {
    /// `blocks * replicas`: every replica consumes one tick
    #[default]
    PerReplica,
    /// `blocks`: every block consumes one tick
    PerBlock,
}

/// Storage node configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Listen address of the storage RPC service
    pub listen: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9200".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.block_size, 4 * 1024 * 1024);
        assert_eq!(config.master.block_placement, BlockPlacementPolicy::RoundRobin);
        assert_eq!(config.master.clock_advance, ClockAdvance::PerReplica);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            block_size = 1024

            [master]
            storages = ["127.0.0.1:9201", "127.0.0.1:9202"]
            block_placement = "permutation"
            replica_placement = "permutation"
            traffic_half_life_secs = inf
            "#,
        )
        .unwrap();

        assert_eq!(config.block_size, 1024);
        assert_eq!(config.master.storages.len(), 2);
        assert_eq!(config.master.block_placement, BlockPlacementPolicy::Permutation);
        assert_eq!(
            config.master.replica_placement,
            ReplicaPlacementPolicy::Permutation
        );
        assert!(config.master.traffic_half_life_secs.is_infinite());
        // untouched sections keep their defaults
        assert_eq!(config.master.maglev_multiplier, 100);
        assert_eq!(config.storage.listen, "0.0.0.0:9200");
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::from_toml_str("block_size = 0").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = Config::from_toml_str("[master]\nmaglev_multiplier = 0").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = Config::from_toml_str("[master]\ntraffic_half_life_secs = 0.0").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = Config::from_toml_str("[master]\nblock_placement = \"random\"").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[master]\nrebalance_interval_secs = 3").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.master.rebalance_interval(), Duration::from_secs(3));

        assert!(matches!(
            Config::load("/nonexistent/tidefs.toml"),
            Err(Error::Io(_))
        ));
    }
}
