//! Workflow controller — the surface a view layer drives.
//!
//! DESIGN
//! ======
//! Owns the shared [`WorkflowStore`] and the three drivers that mutate it:
//! connectivity monitor, preview pipeline, and submitter. The controller is
//! cheap to clone; clones share one workflow. Dropping the last clone stops
//! health polling.
//!
//! User actions that only touch local state (`remove_image`, accept/retry,
//! `reset_all`) complete synchronously. `select_image` starts the preview
//! request in the background and hands back its join handle.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::WorkflowConfig;
use crate::inference::types::{AnalysisResult, ImageFile, InferenceService};
use crate::services::monitor::ConnectivityMonitor;
use crate::services::preview::PreviewPipeline;
use crate::services::submission::Submitter;
use crate::state::connectivity::ConnectivityState;
use crate::state::slot::{PreviewOutcome, SlotError, SlotKey, ValidationError};
use crate::state::submission::SubmissionError;
use crate::state::WorkflowState;
use crate::store::WorkflowStore;

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;

#[derive(Clone)]
pub struct WorkflowController {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<WorkflowStore>,
    monitor: ConnectivityMonitor,
    previews: PreviewPipeline,
    submitter: Submitter,
}

impl WorkflowController {
    #[must_use]
    pub fn new(service: Arc<dyn InferenceService>, config: WorkflowConfig) -> Self {
        let store = Arc::new(WorkflowStore::new(WorkflowState::new(&config)));
        let monitor = ConnectivityMonitor::new(Arc::clone(&store), Arc::clone(&service), config.health_poll_interval);
        let previews = PreviewPipeline::new(Arc::clone(&store), Arc::clone(&service));
        let submitter = Submitter::new(Arc::clone(&store), service);
        Self { inner: Arc::new(Inner { store, monitor, previews, submitter }) }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Begin connectivity monitoring. Must be called within a tokio runtime.
    pub fn start(&self) {
        self.inner.monitor.start();
    }

    pub fn stop(&self) {
        self.inner.monitor.stop();
    }

    /// Manual re-check, for a "retry connection" control.
    pub async fn check_connectivity(&self) -> Option<ConnectivityState> {
        self.inner.monitor.check_now().await
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> WorkflowState {
        self.inner.store.snapshot()
    }

    /// Revision counter that changes whenever visible state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.store.subscribe()
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.inner.store.read(WorkflowState::can_submit)
    }

    // -------------------------------------------------------------------------
    // Slot actions
    // -------------------------------------------------------------------------

    /// Attach `file` to `slot` and request its mask preview.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the file is rejected; the slot is
    /// unchanged and no request is made.
    pub fn select_image(&self, slot: SlotKey, file: ImageFile) -> Result<JoinHandle<PreviewOutcome>, ValidationError> {
        let image = file.clone();
        let ticket = self.inner.store.update(|state| state.select_image(slot, file))?;
        info!(%slot, file = %image.file_name, size = image.size(), "image selected");
        Ok(self.inner.previews.spawn(ticket, image))
    }

    pub fn remove_image(&self, slot: SlotKey) {
        self.inner.store.update(|state| state.remove_image(slot));
        info!(%slot, "image removed");
    }

    /// # Errors
    ///
    /// Returns [`SlotError::NoPendingPreview`] unless a preview awaits a decision.
    pub fn accept_preview(&self, slot: SlotKey) -> Result<(), SlotError> {
        self.inner.store.update_if(|state| {
            let accepted = state.accept_preview(slot);
            let changed = accepted.is_ok();
            (accepted, changed)
        })
    }

    /// Discard the slot's image and preview so the user can pick again.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::NoPendingPreview`] unless a preview awaits a decision.
    pub fn retry_preview(&self, slot: SlotKey) -> Result<(), SlotError> {
        self.inner.store.update_if(|state| {
            let retried = state.retry_preview(slot);
            let changed = retried.is_ok();
            (retried, changed)
        })
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// See [`Submitter::submit`].
    pub async fn submit(&self) -> Result<AnalysisResult, SubmissionError> {
        self.inner.submitter.submit().await
    }

    /// Clear all slots and the submission. Connectivity monitoring continues.
    pub fn reset_all(&self) {
        self.inner.store.update(WorkflowState::reset);
        info!("workflow reset");
    }
}
