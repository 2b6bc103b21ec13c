//! Hash Ring Module
//!
//! Consistent-hashing ring that maps string keys to node identifiers.
//!
//! Each physical node occupies `replicas` positions on the ring (virtual
//! replicas) to even out key distribution. A key is owned by the node at
//! the smallest ring position >= the key's hash, wrapping around to the
//! first position when no such position exists.

use std::collections::{BTreeMap, HashSet};

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{CacheError, Result};

// == Hash Ring ==
/// Sorted mapping from hash positions to node identifiers.
///
/// Position collisions between distinct nodes are resolved
/// last-writer-wins; removal only deletes positions still owned by the
/// departing node, so a collision never removes another node's position.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Ring positions ordered by hash value
    positions: BTreeMap<u64, String>,
    /// Physical nodes currently registered
    nodes: HashSet<String>,
    /// Virtual replicas per physical node
    replicas: usize,
}

impl HashRing {
    // == Constructor ==
    /// Creates an empty ring with the given number of virtual replicas
    /// per physical node.
    ///
    /// Every node is placed with the same replica count; the count is
    /// fixed at construction so load stays balanced across nodes.
    pub fn new(replicas: usize) -> Self {
        Self {
            positions: BTreeMap::new(),
            nodes: HashSet::new(),
            replicas,
        }
    }

    // == Add Node ==
    /// Inserts a node at all of its replica positions.
    ///
    /// Re-adding an existing node recomputes the same positions, so the
    /// operation is idempotent.
    pub fn add_node(&mut self, node_id: &str) {
        self.nodes.insert(node_id.to_string());
        for i in 0..self.replicas {
            let hash = position_hash(node_id, i);
            self.positions.insert(hash, node_id.to_string());
        }
    }

    // == Remove Node ==
    /// Removes all replica positions for a node.
    ///
    /// Returns false if the node was never added.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        if !self.nodes.remove(node_id) {
            return false;
        }
        for i in 0..self.replicas {
            let hash = position_hash(node_id, i);
            // A colliding position may have been overwritten by a later
            // add; only remove positions this node still owns.
            if self.positions.get(&hash).map(|n| n == node_id) == Some(true) {
                self.positions.remove(&hash);
            }
        }
        true
    }

    // == Resolve ==
    /// Returns the node identifier owning the given key.
    ///
    /// # Errors
    /// Returns `CacheError::EmptyRing` if no nodes are registered.
    pub fn resolve(&self, key: &str) -> Result<&str> {
        let hash = xxh3_64(key.as_bytes());
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, node_id)| node_id.as_str())
            .ok_or(CacheError::EmptyRing)
    }

    // == Contains ==
    /// Checks whether a node is registered on the ring.
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    // == Node Count ==
    /// Returns the number of physical nodes on the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // == Is Empty ==
    /// Returns true if no nodes are registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // == Position Count ==
    /// Returns the number of occupied ring positions.
    ///
    /// Normally `node_count() * replicas`; lower only if two virtual
    /// positions hashed identically.
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }
}

// == Position Hashing ==
/// Hashes one virtual replica of a node onto the ring.
fn position_hash(node_id: &str, replica: usize) -> u64 {
    xxh3_64(format!("{}#{}", node_id, replica).as_bytes())
}
