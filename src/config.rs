//! Configuration Module
//!
//! Handles loading and managing cluster configuration from environment variables.

use std::env;

/// Cluster configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Virtual replicas per physical node on the hash ring
    pub replicas: usize,
    /// Background TTL sweep interval in seconds
    pub sweep_interval: u64,
    /// Maximum attempts when migrating a single entry during rebalance
    pub migration_max_attempts: u32,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RING_REPLICAS` - Virtual replicas per node (default: 128)
    /// - `SWEEP_INTERVAL` - TTL sweep frequency in seconds (default: 1)
    /// - `MIGRATION_RETRIES` - Per-entry migration attempts (default: 3)
    pub fn from_env() -> Self {
        Self {
            replicas: env::var("RING_REPLICAS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(128),
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            migration_max_attempts: env::var("MIGRATION_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replicas: 128,
            sweep_interval: 1,
            migration_max_attempts: 3,
        }
    }
}
