//! Traffic-driven replica balancing
//!
//! Every tick the balancer compares each file's read temperature per replica
//! against the cluster-wide median spread over all storage nodes. Hot files
//! gain one replica per block, cold files with more replicas than requested
//! lose one. A failed storage call aborts only that file; blocks already
//! moved stay moved and the next pass picks up the rest.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tidefs_client::BlockStorage;
use tidefs_common::{Error, Result};
use tidefs_meta_store::{FileRecord, MetadataStore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

/// One block change planned by a balancing pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enlistment {
    pub direction: Direction,
    pub block_index: usize,
    pub block_id: String,
    /// Node copying its replica, only set for an increase
    pub source: Option<usize>,
    /// Node gaining the replica, or losing it for a decrease
    pub destination: usize,
}

/// Outcome of one balancing pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BalanceReport {
    pub increased: usize,
    pub decreased: usize,
    pub failed: usize,
}

impl BalanceReport {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.increased == 0 && self.decreased == 0 && self.failed == 0
    }
}

/// Clears the balancing flag when the pass ends
struct BalancingGuard<'a> {
    flag: &'a Mutex<bool>,
}

impl<'a> BalancingGuard<'a> {
    fn acquire(flag: &'a Mutex<bool>) -> Option<Self> {
        let mut running = flag.lock();
        if *running {
            return None;
        }
        *running = true;
        Some(Self { flag })
    }
}

impl Drop for BalancingGuard<'_> {
    fn drop(&mut self) {
        *self.flag.lock() = false;
    }
}

pub struct Balancer {
    store: Arc<MetadataStore>,
    is_balancing: Mutex<bool>,
}

impl Balancer {
    #[must_use]
    pub const fn new(store: Arc<MetadataStore>) -> Self {
        Self {
            store,
            is_balancing: Mutex::new(false),
        }
    }

    /// Files whose replica count should change, and in which direction
    #[allow(clippy::cast_precision_loss)]
    pub fn detect_unbalance(&self) -> Vec<(Arc<FileRecord>, Direction)> {
        let traffic = self.store.traffic();
        let median = traffic.median();
        let nodes = self.store.registry().len();
        if nodes == 0 {
            return Vec::new();
        }
        let threshold = median / nodes as f64;

        let mut unbalanced = Vec::new();
        for file in self.store.files() {
            let actual = file.actual_replicas();
            if actual == 0 {
                continue;
            }
            let temperature = traffic.refresh(&file);
            let ratio = temperature / actual as f64;
            let floor = usize::try_from(file.replication_factor())
                .unwrap_or(usize::MAX)
                .min(nodes);

            if actual < nodes && ratio > threshold {
                unbalanced.push((file, Direction::Increase));
            } else if actual > floor && ratio < threshold {
                unbalanced.push((file, Direction::Decrease));
            }
        }
        debug!(
            median,
            threshold,
            unbalanced = unbalanced.len(),
            "detected unbalanced files"
        );
        unbalanced
    }

    /// Plan one step towards `target` replicas for every block of `file`
    ///
    /// Blocks already at the target are left out, which lets a pass resume
    /// after a partial failure. A block left on the other side of the target
    /// by an earlier aborted pass is moved back towards it.
    pub fn enlist(&self, file: &FileRecord, target: usize) -> Result<Vec<Enlistment>> {
        let registry = self.store.registry();
        let blocks = file.blocks();
        let mut enlistments = Vec::new();

        for (block_index, block) in blocks.iter().enumerate() {
            let ring = &block.ring;
            let enlistment = if ring.len() < target {
                let Some(destination) = ring.next_to_add() else {
                    continue;
                };
                if registry
                    .node(destination)?
                    .holds_block(file.name(), &block.id)
                {
                    return Err(Error::internal(format!(
                        "{} already holds {}",
                        registry.node(destination)?.address(),
                        block.id
                    )));
                }
                let source = self.store.placement().pick_read_replica(ring);
                if source.is_none() {
                    return Err(Error::internal(format!("{} has no replica", block.id)));
                }
                Enlistment {
                    direction: Direction::Increase,
                    block_index,
                    block_id: block.id.clone(),
                    source,
                    destination,
                }
            } else if ring.len() > target {
                let Some(destination) = ring.oldest() else {
                    continue;
                };
                Enlistment {
                    direction: Direction::Decrease,
                    block_index,
                    block_id: block.id.clone(),
                    source: None,
                    destination,
                }
            } else {
                continue;
            };
            enlistments.push(enlistment);
        }
        Ok(enlistments)
    }

    /// Move `file` one replica in `direction`
    ///
    /// `actual` only changes once every block holds exactly the new count.
    pub async fn balance_file(&self, file: &FileRecord, direction: Direction) -> Result<()> {
        let actual = file.actual_replicas();
        let target = match direction {
            Direction::Increase => actual + 1,
            Direction::Decrease => actual.saturating_sub(1),
        };

        // every round moves each off-target block one step closer
        loop {
            let plan = self.enlist(file, target)?;
            if plan.is_empty() {
                break;
            }
            for enlistment in plan {
                match enlistment.direction {
                    Direction::Increase => self.add_replica(file, &enlistment).await?,
                    Direction::Decrease => self.remove_replica(file, &enlistment).await?,
                }
            }
        }

        if let Some(block) = file.blocks().iter().find(|b| b.ring.len() != target) {
            return Err(Error::internal(format!(
                "{} holds {} replicas, expected {target}",
                block.id,
                block.ring.len()
            )));
        }

        file.set_actual_replicas(target);
        info!(
            name = file.name(),
            ?direction,
            replicas = target,
            "file rebalanced"
        );
        Ok(())
    }

    async fn add_replica(&self, file: &FileRecord, enlistment: &Enlistment) -> Result<()> {
        let registry = self.store.registry();
        let source = enlistment
            .source
            .ok_or_else(|| Error::internal(format!("no source for {}", enlistment.block_id)))?;
        let destination = registry.node(enlistment.destination)?;

        registry
            .node(source)?
            .conn()
            .replicate(&enlistment.block_id, destination.address())
            .await?;

        let mut blocks = file.blocks_mut();
        let block = blocks
            .get_mut(enlistment.block_index)
            .ok_or_else(|| Error::internal(format!("{} vanished", enlistment.block_id)))?;
        if block.ring.push() != Some(enlistment.destination) {
            return Err(Error::internal(format!(
                "ring of {} moved during the pass",
                enlistment.block_id
            )));
        }
        destination.record_block(file.name(), &enlistment.block_id);
        debug!(
            block_id = %enlistment.block_id,
            destination = destination.address(),
            "replica added"
        );
        Ok(())
    }

    async fn remove_replica(&self, file: &FileRecord, enlistment: &Enlistment) -> Result<()> {
        let node = self.store.registry().node(enlistment.destination)?;
        node.conn().unset(&enlistment.block_id).await?;

        let mut blocks = file.blocks_mut();
        let block = blocks
            .get_mut(enlistment.block_index)
            .ok_or_else(|| Error::internal(format!("{} vanished", enlistment.block_id)))?;
        if block.ring.pop_oldest() != Some(enlistment.destination) {
            return Err(Error::internal(format!(
                "ring of {} moved during the pass",
                enlistment.block_id
            )));
        }
        node.forget_block(file.name(), &enlistment.block_id);
        debug!(
            block_id = %enlistment.block_id,
            node = node.address(),
            "replica removed"
        );
        Ok(())
    }

    /// Run one balancing pass
    ///
    /// Returns `None` without doing anything when another pass is running.
    pub async fn balance(&self) -> Option<BalanceReport> {
        let _guard = BalancingGuard::acquire(&self.is_balancing)?;
        let mut report = BalanceReport::default();

        for (file, direction) in self.detect_unbalance() {
            match self.balance_file(&file, direction).await {
                Ok(()) => match direction {
                    Direction::Increase => report.increased += 1,
                    Direction::Decrease => report.decreased += 1,
                },
                Err(e) => {
                    warn!(name = file.name(), ?direction, "Balancing aborted: {e}");
                    report.failed += 1;
                }
            }
        }
        Some(report)
    }

    /// Long-running background task: one pass every `interval`
    ///
    /// A tick that fires while the previous pass is still running is dropped.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let balancer = Arc::clone(&self);
            tokio::spawn(async move {
                match balancer.balance().await {
                    Some(report) if !report.is_noop() => info!(
                        increased = report.increased,
                        decreased = report.decreased,
                        failed = report.failed,
                        "Balancing pass finished"
                    ),
                    Some(_) => {}
                    None => debug!("Previous balancing pass still running, tick dropped"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use tidefs_common::{Config, CreateRequest};
    use tidefs_meta_store::NodeRegistry;

    /// Records every call; replicating or unsetting a block in `failing` fails
    struct FakeNode {
        address: String,
        calls: Arc<Mutex<Vec<String>>>,
        failing: Arc<Mutex<HashSet<String>>>,
    }

    #[async_trait]
    impl BlockStorage for FakeNode {
        async fn set(&self, _block_id: &str, _data: Bytes) -> Result<()> {
            Ok(())
        }

        async fn get(&self, _block_id: &str) -> Result<Bytes> {
            Ok(Bytes::new())
        }

        async fn unset(&self, block_id: &str) -> Result<()> {
            self.calls
                .lock()
                .push(format!("unset {block_id} on {}", self.address));
            if self.failing.lock().contains(block_id) {
                return Err(Error::remote("unset failed"));
            }
            Ok(())
        }

        async fn replicate(&self, block_id: &str, destination: &str) -> Result<()> {
            self.calls
                .lock()
                .push(format!("replicate {block_id} to {destination}"));
            if self.failing.lock().contains(block_id) {
                return Err(Error::remote("destination down"));
            }
            Ok(())
        }
    }

    struct Cluster {
        store: Arc<MetadataStore>,
        balancer: Arc<Balancer>,
        calls: Arc<Mutex<Vec<String>>>,
        failing: Arc<Mutex<HashSet<String>>>,
    }

    impl Cluster {
        fn new(nodes: usize) -> Self {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let failing = Arc::new(Mutex::new(HashSet::new()));
            let conns = (0..nodes)
                .map(|i| {
                    let address = format!("s{i}");
                    let conn: Arc<dyn BlockStorage> = Arc::new(FakeNode {
                        address: address.clone(),
                        calls: Arc::clone(&calls),
                        failing: Arc::clone(&failing),
                    });
                    (address, conn)
                })
                .collect();
            let mut config = Config {
                block_size: 4,
                ..Config::default()
            };
            config.master.traffic_half_life_secs = f64::INFINITY;
            let registry = Arc::new(NodeRegistry::new(conns).unwrap());
            let store = Arc::new(MetadataStore::new(&config, registry));
            Self {
                balancer: Arc::new(Balancer::new(Arc::clone(&store))),
                store,
                calls,
                failing,
            }
        }

        fn create(&self, name: &str, size: u64, replication_factor: u64) {
            self.store
                .create(&CreateRequest {
                    name: name.to_string(),
                    size,
                    replication_factor,
                })
                .unwrap();
        }

        async fn hit(&self, name: &str, times: usize) {
            for _ in 0..times {
                self.store.lookup(name).unwrap();
            }
            self.store.traffic().flush().await;
        }

        fn replicas(&self, name: &str) -> Vec<Vec<String>> {
            let file = self.store.get(name).unwrap();
            file.assignments(self.store.registry())
                .into_iter()
                .map(|a| a.replicas)
                .collect()
        }

        fn holds(&self, node: usize, file: &str, block_id: &str) -> bool {
            self.store
                .registry()
                .get(node)
                .unwrap()
                .holds_block(file, block_id)
        }
    }

    #[tokio::test]
    async fn test_hot_file_gains_then_loses_a_replica() {
        let cluster = Cluster::new(4);
        cluster.create("a", 8, 1);
        cluster.create("b", 4, 1);
        cluster.create("c", 4, 1);
        cluster.hit("a", 100).await;

        let unbalanced = cluster.balancer.detect_unbalance();
        assert_eq!(unbalanced.len(), 1);
        assert_eq!(unbalanced[0].0.name(), "a");
        assert_eq!(unbalanced[0].1, Direction::Increase);

        let report = cluster.balancer.balance().await.unwrap();
        assert_eq!(report.increased, 1);
        assert_eq!(cluster.store.get("a").unwrap().actual_replicas(), 2);
        assert_eq!(cluster.replicas("a"), vec![vec!["s0", "s1"], vec!["s1", "s2"]]);
        assert!(cluster.holds(1, "a", "a:0"));
        assert!(cluster.holds(2, "a", "a:1"));
        assert_eq!(cluster.calls.lock().len(), 2);

        cluster.hit("b", 300).await;
        cluster.hit("c", 300).await;
        let report = cluster.balancer.balance().await.unwrap();
        assert_eq!(
            report,
            BalanceReport {
                increased: 2,
                decreased: 1,
                failed: 0
            }
        );

        let a = cluster.store.get("a").unwrap();
        assert_eq!(a.actual_replicas(), 1);
        assert_eq!(cluster.replicas("a"), vec![vec!["s1"], vec!["s2"]]);
        assert!(!cluster.holds(0, "a", "a:0"));
        assert!(!cluster.holds(1, "a", "a:1"));
        assert!(cluster.holds(1, "a", "a:0"));

        assert_eq!(cluster.replicas("b"), vec![vec!["s2", "s3"]]);
        assert_eq!(cluster.replicas("c"), vec![vec!["s3", "s0"]]);

        let calls = cluster.calls.lock();
        assert!(calls.contains(&"unset a:0 on s0".to_string()));
        assert!(calls.contains(&"unset a:1 on s1".to_string()));
        assert!(calls.contains(&"replicate b:0 to s3".to_string()));
        assert!(calls.contains(&"replicate c:0 to s0".to_string()));
    }

    #[tokio::test]
    async fn test_hot_file_flagged_cold_file_left_alone() {
        let cluster = Cluster::new(4);
        cluster.create("a", 4, 1);
        cluster.create("b", 4, 1);
        cluster.hit("a", 100).await;
        cluster.hit("b", 1).await;

        let unbalanced = cluster.balancer.detect_unbalance();
        assert_eq!(unbalanced.len(), 1);
        assert_eq!(unbalanced[0].0.name(), "a");
        assert_eq!(unbalanced[0].1, Direction::Increase);

        let report = cluster.balancer.balance().await.unwrap();
        assert_eq!(report.increased, 1);
        assert_eq!(report.decreased, 0);
        assert_eq!(cluster.store.get("a").unwrap().actual_replicas(), 2);
        assert_eq!(cluster.store.get("b").unwrap().actual_replicas(), 1);
    }

    #[tokio::test]
    async fn test_direction_flip_after_failure_evens_out_blocks() {
        let cluster = Cluster::new(4);
        cluster.create("a", 8, 1);
        let a = cluster.store.get("a").unwrap();

        cluster
            .balancer
            .balance_file(&a, Direction::Increase)
            .await
            .unwrap();
        assert_eq!(a.actual_replicas(), 2);

        cluster.failing.lock().insert("a:1".to_string());
        assert!(
            cluster
                .balancer
                .balance_file(&a, Direction::Decrease)
                .await
                .is_err()
        );
        assert_eq!(a.actual_replicas(), 2);
        assert_eq!(cluster.replicas("a"), vec![vec!["s1"], vec!["s1", "s2"]]);

        cluster.failing.lock().clear();
        cluster
            .balancer
            .balance_file(&a, Direction::Increase)
            .await
            .unwrap();
        assert_eq!(a.actual_replicas(), 3);
        assert!(a.blocks().iter().all(|b| b.ring.len() == 3));
        assert_eq!(
            cluster.replicas("a"),
            vec![vec!["s1", "s2", "s3"], vec!["s1", "s2", "s3"]]
        );
        assert!(!cluster.holds(0, "a", "a:0"));
        assert!(cluster.holds(3, "a", "a:0"));
    }

    #[tokio::test]
    async fn test_files_without_replicas_are_skipped() {
        let cluster = Cluster::new(3);
        cluster.create("z", 4, 0);
        cluster.create("y", 4, 1);
        cluster.hit("z", 50).await;

        assert!(cluster.balancer.detect_unbalance().is_empty());
        assert!(cluster.balancer.balance().await.unwrap().is_noop());
        assert!(cluster.calls.lock().is_empty());
        assert_eq!(cluster.store.get("z").unwrap().actual_replicas(), 0);
    }

    #[tokio::test]
    async fn test_full_file_is_not_increased() {
        let cluster = Cluster::new(2);
        cluster.create("a", 4, 5);
        cluster.create("b", 4, 1);
        cluster.hit("a", 10).await;

        assert_eq!(cluster.store.get("a").unwrap().actual_replicas(), 2);
        assert!(cluster.balancer.detect_unbalance().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_resumes_next_pass() {
        let cluster = Cluster::new(4);
        cluster.create("a", 12, 1);
        cluster.create("b", 4, 1);
        cluster.hit("a", 10).await;
        cluster.failing.lock().insert("a:1".to_string());

        let report = cluster.balancer.balance().await.unwrap();
        assert_eq!(report.failed, 1);
        let a = cluster.store.get("a").unwrap();
        assert_eq!(a.actual_replicas(), 1);
        assert_eq!(
            cluster.replicas("a"),
            vec![vec!["s0", "s1"], vec!["s1"], vec!["s2"]]
        );

        cluster.failing.lock().clear();
        let report = cluster.balancer.balance().await.unwrap();
        assert_eq!(report.increased, 1);
        assert_eq!(a.actual_replicas(), 2);
        assert_eq!(
            cluster.replicas("a"),
            vec![vec!["s0", "s1"], vec!["s1", "s2"], vec!["s2", "s3"]]
        );

        let calls = cluster.calls.lock();
        let copies_of_first = calls.iter().filter(|c| c.starts_with("replicate a:0")).count();
        assert_eq!(copies_of_first, 1);
        let copies_of_second = calls.iter().filter(|c| c.starts_with("replicate a:1")).count();
        assert_eq!(copies_of_second, 2);
    }

    #[tokio::test]
    async fn test_drifted_bookkeeping_aborts_enlistment() {
        let cluster = Cluster::new(3);
        cluster.create("a", 4, 1);
        cluster
            .store
            .registry()
            .get(1)
            .unwrap()
            .record_block("a", "a:0");

        let a = cluster.store.get("a").unwrap();
        let err = cluster.balancer.enlist(&a, 2).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        let plan = cluster.balancer.enlist(&a, 0).unwrap();
        assert_eq!(
            plan,
            vec![Enlistment {
                direction: Direction::Decrease,
                block_index: 0,
                block_id: "a:0".to_string(),
                source: None,
                destination: 0,
            }]
        );
    }

    #[tokio::test]
    async fn test_only_one_pass_at_a_time() {
        let cluster = Cluster::new(2);
        let guard = BalancingGuard::acquire(&cluster.balancer.is_balancing).unwrap();
        assert!(cluster.balancer.balance().await.is_none());
        drop(guard);
        assert!(cluster.balancer.balance().await.is_some());
    }

    #[tokio::test]
    async fn test_no_storage_nodes() {
        let cluster = Cluster::new(0);
        cluster.create("a", 4, 1);
        cluster.hit("a", 3).await;
        assert!(cluster.balancer.detect_unbalance().is_empty());
    }

    #[tokio::test]
    async fn test_periodic_task_balances() {
        let cluster = Cluster::new(3);
        cluster.create("a", 4, 1);
        cluster.create("b", 4, 1);
        cluster.hit("a", 20).await;

        let task = tokio::spawn(Arc::clone(&cluster.balancer).run(Duration::from_millis(10)));
        for _ in 0..100 {
            if cluster.store.get("a").unwrap().actual_replicas() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();

        assert_eq!(cluster.store.get("a").unwrap().actual_replicas(), 3);
        assert_eq!(cluster.store.get("b").unwrap().actual_replicas(), 1);
    }
}
