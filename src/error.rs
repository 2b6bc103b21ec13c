//! Error types for the cache cluster
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache cluster.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No nodes are registered on the hash ring
    #[error("Ring is empty: no nodes registered")]
    EmptyRing,

    /// Node id was never added to the cluster
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store is at capacity and eviction failed
    #[error("Store full: {0}")]
    StoreFull(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache cluster.
pub type Result<T> = std::result::Result<T, CacheError>;
