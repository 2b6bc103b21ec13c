//! Cluster Module
//!
//! Shared routing state and the caller-facing cache service.

pub mod service;
pub mod state;

pub use service::{CacheService, ClusterStats};
pub use state::{ClusterState, SharedStore};
