use sq_core::StrategyError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Blocking workers poll it between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), StrategyError> {
        if self.is_cancelled() {
            Err(StrategyError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Guard that raises this flag when dropped unless disarmed. Held by an
    /// awaiting future so a dropped future stops its blocking worker.
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop { flag: self.clone(), armed: true }
    }
}

pub struct CancelOnDrop {
    flag: CancelFlag,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.cancel();
        }
    }
}

/// Runs `work` on the blocking pool. If the returned future is dropped
/// before the worker finishes, `cancel` is raised so the worker can bail.
///
/// Cancellation is cooperative: the worker only stops at its next
/// `check()`. A single lopdf `load_mem` or `save_to` call cannot be
/// interrupted, so a worker may outlive its timeout by the length of that
/// call while its blocking thread stays busy.
pub async fn run_blocking<T, F>(cancel: &CancelFlag, work: F) -> Result<T, StrategyError>
where
    T: Send + 'static,
    F: FnOnce(&CancelFlag) -> Result<T, StrategyError> + Send + 'static,
{
    cancel.check()?;
    let guard = cancel.guard();
    let flag = cancel.clone();
    let joined = tokio::task::spawn_blocking(move || work(&flag)).await;
    guard.disarm();
    joined.map_err(|e| StrategyError::Join(e.to_string()))?
}
