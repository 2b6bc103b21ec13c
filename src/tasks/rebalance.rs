//! Rebalance Task
//!
//! Background worker that keeps entries co-located with their ring
//! owner after topology changes. Jobs arrive on a channel from the
//! cache service: a `Scan` re-homes misplaced entries across all
//! stores after a node joins; a `Drain` empties a detached store after
//! a node leaves.
//!
//! Scans carry a generation stamp and yield between entries once a
//! newer topology change supersedes them. Drains run to completion:
//! a detached store is unreachable after its job finishes, so its
//! remaining entries would otherwise be lost outright.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::cluster::{ClusterState, SharedStore};

/// Delay between attempts to migrate the same entry.
const RETRY_DELAY: Duration = Duration::from_millis(1);

/// Polling interval while waiting for the queue to drain.
const IDLE_POLL: Duration = Duration::from_millis(5);

// == Rebalance Job ==
/// One unit of rebalance work submitted by a topology change.
enum RebalanceJob {
    /// Re-home misplaced entries across all registered stores.
    Scan { generation: u64 },
    /// Move every live entry out of a store detached by node removal.
    Drain { node_id: String, store: SharedStore },
}

// == Rebalancer ==
/// Handle to the rebalance worker task.
///
/// Submissions never block the caller; jobs queue on an unbounded
/// channel and the worker processes them in order.
pub struct Rebalancer {
    tx: mpsc::UnboundedSender<RebalanceJob>,
    generation: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl Rebalancer {
    // == Spawn ==
    /// Spawns the worker task over the given cluster state.
    pub fn spawn(state: ClusterState, max_attempts: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = tokio::spawn(run_worker(
            state,
            rx,
            Arc::clone(&generation),
            Arc::clone(&pending),
            max_attempts,
        ));

        Self {
            tx,
            generation,
            pending,
            worker,
        }
    }

    // == Submit Scan ==
    /// Queues a full re-home pass; supersedes any queued or in-flight scan.
    pub fn submit_scan(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.enqueue(RebalanceJob::Scan { generation });
    }

    // == Submit Drain ==
    /// Queues migration of every live entry out of a detached store.
    pub fn submit_drain(&self, node_id: String, store: SharedStore) {
        self.enqueue(RebalanceJob::Drain { node_id, store });
    }

    fn enqueue(&self, job: RebalanceJob) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("Rebalance worker is not running; job dropped");
        }
    }

    // == Wait Idle ==
    /// Waits until every submitted job has been processed.
    pub async fn wait_idle(&self) {
        while self.pending.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    // == Shutdown ==
    /// Aborts the worker task. Jobs submitted afterwards are dropped
    /// with a warning.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

// == Worker Loop ==
async fn run_worker(
    state: ClusterState,
    mut rx: mpsc::UnboundedReceiver<RebalanceJob>,
    generation: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    max_attempts: u32,
) {
    info!("Rebalance worker started");

    while let Some(job) = rx.recv().await {
        match job {
            RebalanceJob::Scan {
                generation: scan_generation,
            } => {
                if scan_generation < generation.load(Ordering::SeqCst) {
                    debug!("Skipping superseded rebalance scan");
                } else {
                    scan_stores(&state, &generation, scan_generation, max_attempts).await;
                }
            }
            RebalanceJob::Drain { node_id, store } => {
                drain_store(&state, &node_id, store, max_attempts).await;
            }
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

// == Scan ==
/// Walks every store and moves entries whose ring owner changed.
///
/// Yields as soon as a newer topology change bumps the generation; the
/// scan queued by that change covers whatever this one left behind.
async fn scan_stores(
    state: &ClusterState,
    generation: &AtomicU64,
    scan_generation: u64,
    max_attempts: u32,
) {
    let mut moved = 0usize;
    let mut failed = 0usize;

    for (node_id, store) in state.all_stores().await {
        let keys = { store.read().await.keys() };

        for key in keys {
            if generation.load(Ordering::SeqCst) != scan_generation {
                debug!("Rebalance scan superseded by a newer topology change");
                return;
            }

            let owner = match state.resolve(&key).await {
                Ok(owner) => owner,
                // Ring emptied under the scan; nothing left to re-home.
                Err(_) => return,
            };
            if owner == node_id {
                continue;
            }

            let removed = { store.write().await.remove_entry(&key) };
            let entry = match removed {
                Some(entry) => entry,
                None => continue,
            };
            if entry.is_expired() {
                continue;
            }

            if migrate_entry(state, &key, entry, max_attempts).await {
                moved += 1;
            } else {
                failed += 1;
            }
        }
    }

    if moved > 0 || failed > 0 {
        info!("Rebalance scan moved {} entries ({} failed)", moved, failed);
    }
}

// == Drain ==
/// Migrates every live entry out of a detached store.
async fn drain_store(
    state: &ClusterState,
    node_id: &str,
    store: SharedStore,
    max_attempts: u32,
) {
    let entries = { store.write().await.take_entries() };
    let total = entries.len();
    let mut moved = 0usize;
    let mut dropped = 0usize;

    for (key, entry) in entries {
        if entry.is_expired() {
            continue;
        }
        if migrate_entry(state, &key, entry, max_attempts).await {
            moved += 1;
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        warn!(
            "Drained node {}: migrated {} of {} entries, dropped {}",
            node_id, moved, total, dropped
        );
    } else {
        info!("Drained node {}: migrated {} of {} entries", node_id, moved, total);
    }
}

// == Entry Migration ==
/// Moves one entry to its current ring owner, preserving its creation
/// time and expiry deadline. Retries a bounded number of times; a
/// single entry's failure never aborts the surrounding job.
async fn migrate_entry(
    state: &ClusterState,
    key: &str,
    entry: CacheEntry,
    max_attempts: u32,
) -> bool {
    for attempt in 1..=max_attempts {
        let owner = match state.resolve(key).await {
            Ok(owner) => owner,
            // No nodes remain; the entry has nowhere to live.
            Err(_) => return false,
        };

        if let Some(target) = state.store(&owner).await {
            match target.write().await.insert_entry(key.to_string(), entry.clone()) {
                Ok(()) => return true,
                Err(err) => {
                    debug!("Migration attempt {} for key {} failed: {}", attempt, key, err);
                }
            }
        }

        tokio::time::sleep(RETRY_DELAY).await;
    }
    false
}
