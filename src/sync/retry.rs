use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::sync::state::OperationTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySignal {
    Retry,
    Canceled,
}

/// One pending retry per operation tag, shared across every feature. The
/// answer signals are idempotent and fine to send with nothing pending.
#[derive(Clone, Default)]
pub struct RetryDispatcher {
    pending: Arc<Mutex<HashMap<OperationTag, oneshot::Sender<RetrySignal>>>>,
}

impl RetryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a retry for `tag`. An earlier waiter on the same tag is told it
    /// was canceled; a tag belongs to exactly one pending operation.
    pub fn register(&self, tag: OperationTag) -> oneshot::Receiver<RetrySignal> {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.lock().insert(tag, tx) {
            let _ = previous.send(RetrySignal::Canceled);
        }
        rx
    }

    /// Drop the pending retry for `tag`, if any, without signaling.
    pub fn remove(&self, tag: OperationTag) {
        self.lock().remove(&tag);
    }

    /// Replay every pending operation.
    pub fn on_retry_required(&self) {
        for (_, waiter) in self.lock().drain() {
            let _ = waiter.send(RetrySignal::Retry);
        }
    }

    pub fn on_retry_canceled(&self) {
        for (_, waiter) in self.lock().drain() {
            let _ = waiter.send(RetrySignal::Canceled);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<OperationTag, oneshot::Sender<RetrySignal>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
