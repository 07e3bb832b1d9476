//! Preview pipeline — one background mask request per selection.
//!
//! DESIGN
//! ======
//! Each request carries the [`PreviewTicket`] issued at selection time.
//! The result is applied only if the ticket still names the slot's current
//! selection; anything else is dropped as stale. The processing indicator
//! is held by a guard for the life of the request, so it clears even when
//! the task is cancelled.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::inference::types::{ImageFile, InferenceError, InferenceService, MaskPreviewData};
use crate::state::slot::{PreviewOutcome, PreviewTicket, SlotKey};
use crate::state::WorkflowState;
use crate::store::WorkflowStore;

#[cfg(test)]
#[path = "preview_test.rs"]
mod tests;

#[derive(Clone)]
pub struct PreviewPipeline {
    store: Arc<WorkflowStore>,
    service: Arc<dyn InferenceService>,
}

impl PreviewPipeline {
    #[must_use]
    pub fn new(store: Arc<WorkflowStore>, service: Arc<dyn InferenceService>) -> Self {
        Self { store, service }
    }

    /// Request a preview without touching workflow state.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] on transport failure or rejection.
    pub async fn generate(&self, slot: SlotKey, image: &ImageFile) -> Result<MaskPreviewData, InferenceError> {
        debug!(%slot, file = %image.file_name, size = image.size(), "preview requested");
        self.service.preview_mask(image).await
    }

    /// Generate a preview for `ticket` in the background and apply it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, ticket: PreviewTicket, image: ImageFile) -> JoinHandle<PreviewOutcome> {
        let guard = ProcessingGuard::enter(Arc::clone(&self.store));
        let pipeline = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let result = pipeline.generate(ticket.slot, &image).await;
            if let Err(e) = &result {
                warn!(slot = %ticket.slot, token = ticket.token, error = %e, "preview generation failed");
            }

            let outcome = pipeline.store.update(|state| state.complete_preview(ticket, result.ok()));
            match outcome {
                PreviewOutcome::Attached => info!(slot = %ticket.slot, token = ticket.token, "preview attached"),
                PreviewOutcome::Stale => debug!(slot = %ticket.slot, token = ticket.token, "stale preview dropped"),
                PreviewOutcome::Failed => {}
            }
            outcome
        })
    }
}

/// Holds the processing indicator up while a preview request is outstanding.
struct ProcessingGuard {
    store: Arc<WorkflowStore>,
}

impl ProcessingGuard {
    fn enter(store: Arc<WorkflowStore>) -> Self {
        store.update(WorkflowState::preview_started);
        Self { store }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.store.update(WorkflowState::preview_finished);
    }
}
