//! Background Revalidation Scheduler
//!
//! Runs fetch-and-store work after the caller already has its answer.
//! Tasks are never awaited by the code that spawned them, but the scheduler
//! keeps every `JoinHandle` so shutdown can cancel and drain them.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tracks in-flight background revalidations.
#[derive(Debug, Default)]
pub struct RevalidationScheduler {
    token: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RevalidationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `work` for `key` on the current runtime.
    ///
    /// Returns `false` without spawning once the scheduler has been shut
    /// down. The work future must handle its own errors; nothing it does can
    /// reach the caller.
    pub fn spawn<F>(&self, key: &str, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.token.is_cancelled() {
            debug!(key = %key, "Scheduler shut down, skipping background revalidation");
            return false;
        }

        let token = self.token.clone();
        let key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(key = %key, "Background revalidation cancelled");
                }
                _ = work => {}
            }
        });

        let mut handles = self.lock_handles();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        true
    }

    /// Number of revalidations still running.
    pub fn pending(&self) -> usize {
        self.lock_handles()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Waits until every spawned revalidation, including ones spawned while
    /// waiting, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.lock_handles());
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        warn!(error = %e, "Background revalidation panicked");
                    }
                }
            }
        }
    }

    /// Cancels outstanding revalidations and refuses new ones.
    pub async fn shutdown(&self) {
        let outstanding = self.pending();
        self.token.cancel();
        self.wait_idle().await;
        info!(cancelled = outstanding, "Revalidation scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    fn lock_handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}
