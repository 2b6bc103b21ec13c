//! Background Tasks Module
//!
//! Explicit spawned tasks: the TTL sweep loop and the rebalance worker.

pub mod rebalance;
pub mod sweep;

pub use rebalance::Rebalancer;
pub use sweep::spawn_sweep_task;
