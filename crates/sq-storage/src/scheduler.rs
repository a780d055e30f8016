use crate::traits::WorkingStorage;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Deferred removal of working-storage artifacts.
pub trait Scheduler: Send + Sync {
    /// Fire-and-forget: dropping the returned task does not cancel it.
    fn schedule_removal(&self, key: &str, delay: Duration) -> ScheduledTask;

    /// Removals scheduled but not yet run.
    fn pending(&self) -> usize;
}

/// Handle to one scheduled removal.
#[derive(Debug)]
pub struct ScheduledTask {
    key: String,
    due_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the task. False if it was cancelled.
    pub async fn join(self) -> bool {
        self.handle.await.is_ok()
    }
}

/// Tokio timer per artifact against a shared storage backend.
pub struct DeletionScheduler {
    storage: Arc<dyn WorkingStorage>,
    pending: Arc<AtomicUsize>,
}

impl DeletionScheduler {
    pub fn new(storage: Arc<dyn WorkingStorage>) -> Self {
        Self { storage, pending: Arc::new(AtomicUsize::new(0)) }
    }
}

/// Decrements the pending count however the task ends, abort included.
struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Scheduler for DeletionScheduler {
    fn schedule_removal(&self, key: &str, delay: Duration) -> ScheduledTask {
        let storage = self.storage.clone();
        let owned_key = key.to_string();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let slot = PendingSlot(self.pending.clone());

        let due_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let handle = tokio::spawn(async move {
            let _slot = slot;
            tokio::time::sleep(delay).await;
            match storage.remove(&owned_key).await {
                Ok(()) => tracing::debug!(key = %owned_key, "artifact removed"),
                Err(e) => tracing::warn!(key = %owned_key, error = %e, "artifact removal failed"),
            }
        });
        tracing::debug!(key, delay_secs = delay.as_secs(), "removal scheduled");

        ScheduledTask { key: key.to_string(), due_at, handle }
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
