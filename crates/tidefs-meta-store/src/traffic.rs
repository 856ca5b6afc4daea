//! Read traffic recording
//!
//! Lookups must not wait on the traffic bookkeeping, so they only enqueue a
//! [`TrafficEvent::Hit`]. A single worker drains the queue, bumps the file's
//! decay counter and moves the file's value in the running median.

use crate::file::FileRecord;
use parking_lot::Mutex;
use std::sync::Arc;
use tidefs_traffic::RunningMedian;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub enum TrafficEvent {
    /// One read of a file
    Hit(Arc<FileRecord>),
    /// Answered once every event queued before it has been applied
    Flush(oneshot::Sender<()>),
}

/// Traffic queue plus the median of all file temperatures
pub struct TrafficMonitor {
    median: Arc<Mutex<RunningMedian>>,
    tx: mpsc::Sender<TrafficEvent>,
}

impl TrafficMonitor {
    /// Start the traffic worker
    ///
    /// Must be called from within a Tokio runtime. The worker stops once the
    /// monitor is dropped and the queue is drained.
    #[must_use]
    pub fn spawn(queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let median = Arc::new(Mutex::new(RunningMedian::new()));
        tokio::spawn(run_worker(rx, Arc::clone(&median)));
        Self { median, tx }
    }

    /// Add a new file's initial temperature to the median
    pub fn register(&self, temperature: f64) {
        self.median.lock().add(temperature);
    }

    /// Queue a read of `file`; dropped when the queue is full
    pub fn record_hit(&self, file: Arc<FileRecord>) {
        match self.tx.try_send(TrafficEvent::Hit(file)) {
            Ok(()) => {}
            Err(TrySendError::Full(TrafficEvent::Hit(file))) => {
                debug!(name = file.name(), "traffic queue full, dropping hit");
            }
            Err(e) => debug!("traffic queue unavailable: {e}"),
        }
    }

    /// Wait until every hit queued so far has been applied
    pub async fn flush(&self) {
        let (done, applied) = oneshot::channel();
        if self.tx.send(TrafficEvent::Flush(done)).await.is_ok() {
            let _ = applied.await;
        }
    }

    /// Median temperature over all files
    #[must_use]
    pub fn median(&self) -> f64 {
        self.median.lock().median()
    }

    /// Number of files folded into the median
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.median.lock().len()
    }

    /// Decay `file`'s counter to now and fold the result into the median
    ///
    /// Returns the file's current temperature.
    pub fn refresh(&self, file: &FileRecord) -> f64 {
        let mut traffic = file.traffic();
        let current = traffic.counter.get();
        self.median.lock().update(traffic.reported, current);
        traffic.reported = current;
        current
    }
}

impl std::fmt::Debug for TrafficMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficMonitor")
            .field("median", &self.median())
            .finish_non_exhaustive()
    }
}

async fn run_worker(mut rx: mpsc::Receiver<TrafficEvent>, median: Arc<Mutex<RunningMedian>>) {
    while let Some(event) = rx.recv().await {
        match event {
            TrafficEvent::Hit(file) => {
                let mut traffic = file.traffic();
                let current = traffic.counter.hit();
                median.lock().update(traffic.reported, current);
                traffic.reported = current;
            }
            TrafficEvent::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("traffic worker stopped");
}
