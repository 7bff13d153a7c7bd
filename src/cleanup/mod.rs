//! Age-based eviction of stale visitor records.

use crate::storage::{StorageResult, VisitorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Periodically deletes visitors whose `last_update` has fallen outside the
/// retention window. Runs on a detached task, fully outside any request's
/// critical path; failures are logged and never block anything.
pub struct CleanupScheduler {
    store: Arc<dyn VisitorStore>,
    retention_secs: i64,
    interval: Duration,
}

impl CleanupScheduler {
    pub fn new(store: Arc<dyn VisitorStore>, retention_hours: u64, interval_secs: u64) -> Self {
        Self {
            store,
            retention_secs: (retention_hours * 3600) as i64,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// One eviction pass against the given clock; returns records removed.
    pub async fn run_once(&self, now: i64) -> StorageResult<u64> {
        self.store
            .delete_older_than(now - self.retention_secs)
            .await
    }

    /// Spawn the background eviction loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // Skip the first tick which fires immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let now = chrono::Utc::now().timestamp();
                match self.run_once(now).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "evicted stale visitor records"),
                    Err(err) => warn!(error = %err, "visitor cleanup failed"),
                }
            }
        })
    }
}
