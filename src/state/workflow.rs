//! Workflow state — the single queryable object rendered by a view layer.
//!
//! DESIGN
//! ======
//! Composes the slot, connectivity, and submission state machines plus
//! the two bits of advisory UI state: the processing-preview counter and
//! the advisory message. Every method is synchronous; the async drivers in
//! `services` call them between suspension points.

use crate::config::WorkflowConfig;
use crate::inference::types::{ImageFile, MaskPreviewData};
use crate::state::connectivity::ConnectivityStatus;
use crate::state::slot::{ImageSlot, PreviewOutcome, PreviewTicket, SlotError, SlotKey, ValidationError};
use crate::state::submission::{SubmissionCoordinator, SubmissionError, SubmissionTicket};

pub const PREVIEW_FAILED_MESSAGE: &str = "Failed to generate preview. You can still proceed with analysis.";

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;

#[derive(Clone, Debug)]
pub struct WorkflowState {
    slots: Vec<ImageSlot>,
    pub(crate) connectivity: ConnectivityStatus,
    pub(crate) submission: SubmissionCoordinator,
    processing_previews: usize,
    advisory: Option<String>,
    /// Slot a preview-failure advisory is about; cleared with that slot.
    advisory_slot: Option<SlotKey>,
    max_image_bytes: u64,
}

impl WorkflowState {
    #[must_use]
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            slots: SlotKey::REQUIRED.into_iter().map(ImageSlot::new).collect(),
            connectivity: ConnectivityStatus::default(),
            submission: SubmissionCoordinator::default(),
            processing_previews: 0,
            advisory: None,
            advisory_slot: None,
            max_image_bytes: config.max_image_bytes,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn slots(&self) -> &[ImageSlot] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, key: SlotKey) -> &ImageSlot {
        // Every SlotKey has a slot from construction onwards.
        &self.slots[Self::index(key)]
    }

    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityStatus {
        &self.connectivity
    }

    #[must_use]
    pub fn submission(&self) -> &SubmissionCoordinator {
        &self.submission
    }

    /// Advisory (non-blocking) message: rejected file, failed preview.
    #[must_use]
    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    /// True while any preview request is outstanding, stale ones included.
    #[must_use]
    pub fn is_processing_preview(&self) -> bool {
        self.processing_previews > 0
    }

    /// Required slots still lacking a raw image, in display order.
    #[must_use]
    pub fn missing_slots(&self) -> Vec<SlotKey> {
        self.slots
            .iter()
            .filter(|slot| !slot.has_image())
            .map(ImageSlot::key)
            .collect()
    }

    /// What the submit control should show: connected, complete, idle.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.connectivity.is_connected() && self.missing_slots().is_empty() && !self.submission.is_in_flight()
    }

    /// Whether the workflow holds anything a reset would discard.
    #[must_use]
    pub fn has_input(&self) -> bool {
        self.slots.iter().any(ImageSlot::has_image)
    }

    // -------------------------------------------------------------------------
    // Slot transitions
    // -------------------------------------------------------------------------

    /// Validate and attach `file`; on success a preview request is owed.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`]; the slot is unchanged and the error
    /// text becomes the advisory message.
    pub fn select_image(&mut self, key: SlotKey, file: ImageFile) -> Result<PreviewTicket, ValidationError> {
        let max_bytes = self.max_image_bytes;
        match self.slot_mut(key).select(file, max_bytes) {
            Ok(ticket) => {
                self.set_advisory(None, None);
                Ok(ticket)
            }
            Err(err) => {
                self.set_advisory(Some(err.to_string()), None);
                Err(err)
            }
        }
    }

    pub fn remove_image(&mut self, key: SlotKey) {
        self.slot_mut(key).remove();
        self.clear_advisory_for(key);
    }

    /// # Errors
    ///
    /// Returns [`SlotError::NoPendingPreview`] unless a preview awaits a decision.
    pub fn accept_preview(&mut self, key: SlotKey) -> Result<(), SlotError> {
        self.slot_mut(key).accept_preview()
    }

    /// # Errors
    ///
    /// Returns [`SlotError::NoPendingPreview`] unless a preview awaits a decision.
    pub fn retry_preview(&mut self, key: SlotKey) -> Result<(), SlotError> {
        self.slot_mut(key).retry_preview()?;
        self.clear_advisory_for(key);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Preview bookkeeping
    // -------------------------------------------------------------------------

    pub(crate) fn preview_started(&mut self) {
        self.processing_previews += 1;
    }

    pub(crate) fn preview_finished(&mut self) {
        self.processing_previews = self.processing_previews.saturating_sub(1);
    }

    /// Apply a preview completion. A failure for the current selection sets
    /// the advisory message but leaves the slot usable.
    pub fn complete_preview(&mut self, ticket: PreviewTicket, preview: Option<MaskPreviewData>) -> PreviewOutcome {
        let outcome = self.slot_mut(ticket.slot).complete_preview(ticket, preview);
        if outcome == PreviewOutcome::Failed {
            self.set_advisory(Some(PREVIEW_FAILED_MESSAGE.to_owned()), Some(ticket.slot));
        }
        outcome
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    /// Re-check every precondition and, if they hold, snapshot the images
    /// for one analysis request.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::AlreadyInFlight`], then
    /// [`SubmissionError::MissingInput`], then [`SubmissionError::Disconnected`],
    /// checked in that order; no request may be issued.
    pub fn begin_submission(&mut self) -> Result<(SubmissionTicket, Vec<(SlotKey, ImageFile)>), SubmissionError> {
        if self.submission.is_in_flight() {
            return Err(SubmissionError::AlreadyInFlight);
        }
        let missing = self.missing_slots();
        if !missing.is_empty() {
            return Err(self.submission.reject_missing(&missing));
        }
        if !self.connectivity.is_connected() {
            return Err(SubmissionError::Disconnected);
        }
        let ticket = self.submission.begin(&[])?;
        let images = self
            .slots
            .iter()
            .filter_map(|slot| slot.raw_image().map(|image| (slot.key(), image.clone())))
            .collect();
        Ok((ticket, images))
    }

    /// Clear every slot, the submission, and the advisory message.
    /// Connectivity is left alone.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.remove();
        }
        self.submission.reset();
        self.set_advisory(None, None);
    }

    fn set_advisory(&mut self, message: Option<String>, slot: Option<SlotKey>) {
        self.advisory = message;
        self.advisory_slot = slot;
    }

    fn clear_advisory_for(&mut self, key: SlotKey) {
        if self.advisory_slot == Some(key) {
            self.set_advisory(None, None);
        }
    }

    fn index(key: SlotKey) -> usize {
        match key {
            SlotKey::Front => 0,
            SlotKey::Side => 1,
        }
    }

    fn slot_mut(&mut self, key: SlotKey) -> &mut ImageSlot {
        &mut self.slots[Self::index(key)]
    }
}
