//! Shard Cache - a sharded in-memory cache library
//!
//! Keys route through a consistent-hash ring to per-node stores with
//! LRU eviction and TTL expiration. Topology changes trigger background
//! rebalancing that re-homes entries to their current ring owner.

pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod ring;
pub mod tasks;

pub use cluster::{CacheService, ClusterState, ClusterStats};
pub use config::Config;
pub use error::{CacheError, Result};
pub use ring::HashRing;
pub use tasks::spawn_sweep_task;
