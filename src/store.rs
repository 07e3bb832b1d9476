//! The one mutable cell holding [`WorkflowState`].
//!
//! DESIGN
//! ======
//! A poison-tolerant `Mutex` guards the state; closures passed to
//! [`WorkflowStore::update`] run to completion under the lock and must not
//! await, so every transition is atomic with respect to the async tasks
//! (health polling, previews, submission) that share the state.
//!
//! Observers subscribe to a `watch` channel carrying a revision counter
//! that is bumped after each transition that changed something.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::state::WorkflowState;

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

pub struct WorkflowStore {
    state: Mutex<WorkflowState>,
    revision: watch::Sender<u64>,
}

impl WorkflowStore {
    #[must_use]
    pub fn new(state: WorkflowState) -> Self {
        let (revision, _) = watch::channel(0);
        Self { state: Mutex::new(state), revision }
    }

    /// Clone of the current state for rendering or inspection.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowState {
        self.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&WorkflowState) -> R) -> R {
        f(&self.lock())
    }

    /// Run a transition and notify subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut WorkflowState) -> R) -> R {
        let out = f(&mut self.lock());
        self.notify();
        out
    }

    /// Run a transition that reports whether it changed anything; notify
    /// subscribers only if it did.
    pub fn update_if<R>(&self, f: impl FnOnce(&mut WorkflowState) -> (R, bool)) -> R {
        let (out, changed) = f(&mut self.lock());
        if changed {
            self.notify();
        }
        out
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}
