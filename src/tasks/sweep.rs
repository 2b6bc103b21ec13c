//! TTL Sweep Task
//!
//! Background task that periodically removes expired entries from every
//! registered node store.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cluster::ClusterState;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified
/// interval between sweeps. Each sweep takes the write lock on one
/// store at a time, so callers on other stores are never held up.
///
/// # Arguments
/// * `state` - Cluster state whose stores are swept
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the
/// task during shutdown.
pub fn spawn_sweep_task(state: ClusterState, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting TTL sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let mut removed = 0usize;
            for (_node_id, store) in state.all_stores().await {
                removed += store.write().await.sweep_expired();
            }

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let state = ClusterState::new(100);
        state.register_node("n1", 100).await.unwrap();

        {
            let store = state.store("n1").await.unwrap();
            store
                .write()
                .await
                .put("expire_soon".to_string(), "value".to_string(), 100)
                .unwrap();
        }

        let handle = spawn_sweep_task(state.clone(), 1);

        // Wait for the entry to expire and a sweep to run
        tokio::time::sleep(Duration::from_millis(2500)).await;

        {
            let store = state.store("n1").await.unwrap();
            assert_eq!(store.read().await.len(), 0, "expired entry should be swept");
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let state = ClusterState::new(100);
        state.register_node("n1", 100).await.unwrap();

        {
            let store = state.store("n1").await.unwrap();
            store
                .write()
                .await
                .put("long_lived".to_string(), "value".to_string(), 3_600_000)
                .unwrap();
        }

        let handle = spawn_sweep_task(state.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let store = state.store("n1").await.unwrap();
            assert!(store.read().await.contains("long_lived"));
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let state = ClusterState::new(100);
        let handle = spawn_sweep_task(state, 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
