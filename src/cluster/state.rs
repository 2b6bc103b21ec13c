//! Cluster State Module
//!
//! Explicit, shareable state for one cache cluster: the hash ring and
//! the per-node store registry. Each lives behind its own lock so
//! routing reads never serialize behind store mutations. No globals;
//! independent clusters can coexist in one process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::NodeStore;
use crate::error::{CacheError, Result};
use crate::ring::HashRing;

/// A node's store, shared between callers and background tasks.
pub type SharedStore = Arc<RwLock<NodeStore>>;

// == Cluster State ==
/// Routing and storage state shared across one cluster's callers.
///
/// Ordering invariant: a store is registered before its node enters the
/// ring, and the node leaves the ring before its store is detached.
/// `resolve` therefore never returns a node id without a registered
/// store, except transiently for callers that resolved just before a
/// removal — those observe a missing store and treat it as a miss.
#[derive(Clone)]
pub struct ClusterState {
    /// Hash ring, guarded separately from the stores
    ring: Arc<RwLock<HashRing>>,
    /// Store registry: node id -> shared store
    stores: Arc<RwLock<HashMap<String, SharedStore>>>,
}

impl ClusterState {
    // == Constructor ==
    /// Creates empty cluster state with the given ring replica count.
    pub fn new(replicas: usize) -> Self {
        Self {
            ring: Arc::new(RwLock::new(HashRing::new(replicas))),
            stores: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // == Resolve ==
    /// Returns the node id owning the given key.
    pub async fn resolve(&self, key: &str) -> Result<String> {
        let ring = self.ring.read().await;
        ring.resolve(key).map(|node_id| node_id.to_string())
    }

    // == Store Lookup ==
    /// Returns the shared store for a node, if registered.
    pub async fn store(&self, node_id: &str) -> Option<SharedStore> {
        self.stores.read().await.get(node_id).cloned()
    }

    // == Register Node ==
    /// Creates a store for the node and places it on the ring.
    ///
    /// # Errors
    /// Returns `InvalidRequest` if the node id is already registered;
    /// replacing a live store would silently discard its entries.
    pub async fn register_node(&self, node_id: &str, capacity: usize) -> Result<()> {
        {
            let mut stores = self.stores.write().await;
            if stores.contains_key(node_id) {
                return Err(CacheError::InvalidRequest(format!(
                    "Node {} is already registered",
                    node_id
                )));
            }
            stores.insert(
                node_id.to_string(),
                Arc::new(RwLock::new(NodeStore::new(capacity))),
            );
        }
        self.ring.write().await.add_node(node_id);
        Ok(())
    }

    // == Unregister Node ==
    /// Removes the node from the ring, then detaches and returns its
    /// store so the caller can migrate its entries.
    ///
    /// The ring is updated first: new requests route to survivors
    /// immediately, at the cost of transient misses for entries still
    /// awaiting migration.
    ///
    /// # Errors
    /// Returns `UnknownNode` if the node was never registered.
    pub async fn unregister_node(&self, node_id: &str) -> Result<SharedStore> {
        let removed = { self.ring.write().await.remove_node(node_id) };
        if !removed {
            return Err(CacheError::UnknownNode(node_id.to_string()));
        }
        self.stores
            .write()
            .await
            .remove(node_id)
            .ok_or_else(|| CacheError::UnknownNode(node_id.to_string()))
    }

    // == All Stores ==
    /// Returns a snapshot of all registered (node id, store) pairs.
    pub async fn all_stores(&self) -> Vec<(String, SharedStore)> {
        self.stores
            .read()
            .await
            .iter()
            .map(|(node_id, store)| (node_id.clone(), Arc::clone(store)))
            .collect()
    }

    // == Node Count ==
    /// Returns the number of registered nodes.
    pub async fn node_count(&self) -> usize {
        self.stores.read().await.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_starts_empty() {
        let state = ClusterState::new(100);
        assert_eq!(state.node_count().await, 0);
        assert!(matches!(
            state.resolve("key").await,
            Err(CacheError::EmptyRing)
        ));
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let state = ClusterState::new(100);
        state.register_node("n1", 10).await.unwrap();

        assert_eq!(state.resolve("key").await.unwrap(), "n1");
        assert!(state.store("n1").await.is_some());
        assert_eq!(state.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() {
        let state = ClusterState::new(100);
        state.register_node("n1", 10).await.unwrap();

        let result = state.register_node("n1", 20).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));

        // The original store survives
        assert_eq!(state.store("n1").await.unwrap().read().await.capacity(), 10);
    }

    #[tokio::test]
    async fn test_unregister_detaches_store() {
        let state = ClusterState::new(100);
        state.register_node("n1", 10).await.unwrap();

        let store = state.unregister_node("n1").await.unwrap();
        store.write().await.put("k".to_string(), "v".to_string(), 0).unwrap();

        assert!(state.store("n1").await.is_none());
        assert_eq!(state.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_unregister_unknown_fails() {
        let state = ClusterState::new(100);
        assert!(matches!(
            state.unregister_node("ghost").await,
            Err(CacheError::UnknownNode(_))
        ));
    }
}
