//! Cache Service Module
//!
//! The caller-facing surface of the cluster: routes every operation
//! through the hash ring to the owning node's store, manages node
//! membership, and schedules background rebalancing and TTL sweeps.

use std::collections::HashMap;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStats;
use crate::cluster::ClusterState;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, Rebalancer};

// == Cluster Stats ==
/// Aggregated statistics across all node stores.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterStats {
    /// Number of registered nodes
    pub nodes: usize,
    /// Total entries across all stores (including not-yet-swept expired ones)
    pub entries: usize,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total LRU evictions
    pub evictions: u64,
    /// Total TTL expirations
    pub expirations: u64,
    /// Per-node breakdown
    pub per_node: HashMap<String, CacheStats>,
}

// == Cache Service ==
/// A single logical key-value cache backed by many per-node stores.
///
/// Construction spawns the rebalance worker and the TTL sweep task, so
/// a service must be created inside a Tokio runtime. Both tasks are
/// aborted by `shutdown` and on drop.
pub struct CacheService {
    state: ClusterState,
    rebalancer: Rebalancer,
    sweeper: JoinHandle<()>,
}

impl CacheService {
    // == Constructor ==
    /// Creates an empty cluster from the given configuration.
    pub fn new(config: Config) -> Self {
        let state = ClusterState::new(config.replicas);
        let rebalancer = Rebalancer::spawn(state.clone(), config.migration_max_attempts);
        let sweeper = spawn_sweep_task(state.clone(), config.sweep_interval);

        Self {
            state,
            rebalancer,
            sweeper,
        }
    }

    // == Put ==
    /// Stores a key-value pair on the key's owning node.
    ///
    /// `ttl_ms == 0` means the entry never expires. Capacity pressure is
    /// absorbed by LRU eviction, never surfaced as an error.
    ///
    /// # Errors
    /// `InvalidRequest` for an empty or oversized key/value;
    /// `EmptyRing` when no nodes are registered.
    pub async fn put(&self, key: &str, value: String, ttl_ms: u64) -> Result<()> {
        validate_key(key)?;
        let owner = self.state.resolve(key).await?;

        match self.state.store(&owner).await {
            Some(store) => store.write().await.put(key.to_string(), value, ttl_ms),
            None => {
                // Owner left between resolve and lookup; the write joins
                // the transient-miss window the removal policy accepts.
                debug!("Owner {} of key {} left during put; write dropped", owner, key);
                Ok(())
            }
        }
    }

    // == Get ==
    /// Retrieves the value for a key from its owning node.
    ///
    /// Missing and expired keys are both `Ok(None)`, never an error.
    ///
    /// # Errors
    /// `InvalidRequest` for an empty key; `EmptyRing` when no nodes are
    /// registered.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let owner = self.state.resolve(key).await?;

        match self.state.store(&owner).await {
            Some(store) => Ok(store.write().await.get(key)),
            None => Ok(None),
        }
    }

    // == Delete ==
    /// Removes a key from its owning node; idempotent.
    ///
    /// # Errors
    /// `InvalidRequest` for an empty key; `EmptyRing` when no nodes are
    /// registered.
    pub async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let owner = self.state.resolve(key).await?;

        if let Some(store) = self.state.store(&owner).await {
            store.write().await.delete(key);
        }
        Ok(())
    }

    // == Add Node ==
    /// Registers a new node with its own store of the given capacity,
    /// then schedules an asynchronous rebalance scan to pull over the
    /// keys the new node now owns.
    ///
    /// # Errors
    /// `InvalidRequest` for an empty id, a zero capacity, or an id that
    /// is already registered.
    pub async fn add_node(&self, node_id: &str, capacity: usize) -> Result<()> {
        if node_id.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Node id must not be empty".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(CacheError::InvalidRequest(
                "Node capacity must be greater than zero".to_string(),
            ));
        }

        self.state.register_node(node_id, capacity).await?;
        self.rebalancer.submit_scan();

        info!("Node {} joined with capacity {}", node_id, capacity);
        Ok(())
    }

    // == Remove Node ==
    /// Removes a node: the ring is updated immediately so new requests
    /// route to survivors, and a background drain migrates the departed
    /// store's live entries to their new owners.
    ///
    /// Returns before migration completes; `wait_rebalanced` awaits it.
    ///
    /// # Errors
    /// `UnknownNode` (a soft error, logged as a warning) if the id was
    /// never added — calling remove twice is safe.
    pub async fn remove_node(&self, node_id: &str) -> Result<()> {
        match self.state.unregister_node(node_id).await {
            Ok(store) => {
                self.rebalancer.submit_drain(node_id.to_string(), store);
                info!("Node {} left; entry migration scheduled", node_id);
                Ok(())
            }
            Err(CacheError::UnknownNode(id)) => {
                warn!("Ignoring removal of unknown node {}", id);
                Err(CacheError::UnknownNode(id))
            }
            Err(err) => Err(err),
        }
    }

    // == Stats ==
    /// Returns aggregated statistics across all node stores.
    pub async fn stats(&self) -> ClusterStats {
        let mut totals = ClusterStats::default();

        for (node_id, store) in self.state.all_stores().await {
            let stats = store.read().await.stats();
            totals.entries += stats.total_entries;
            totals.hits += stats.hits;
            totals.misses += stats.misses;
            totals.evictions += stats.evictions;
            totals.expirations += stats.expirations;
            totals.per_node.insert(node_id, stats);
        }
        totals.nodes = totals.per_node.len();

        totals
    }

    // == Wait Rebalanced ==
    /// Waits until no rebalance work is queued or in flight.
    pub async fn wait_rebalanced(&self) {
        self.rebalancer.wait_idle().await;
    }

    // == State Access ==
    /// Returns the underlying cluster state.
    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    // == Shutdown ==
    /// Aborts the background sweep and rebalance tasks.
    pub fn shutdown(&self) {
        self.sweeper.abort();
        self.rebalancer.shutdown();
    }
}

impl Drop for CacheService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// == Validation ==
/// Rejects the empty key before routing; stores enforce size limits.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Key must not be empty".to_string(),
        ));
    }
    Ok(())
}
