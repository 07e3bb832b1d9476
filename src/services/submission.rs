//! Submission driver — the single combined analysis request.
//!
//! DESIGN
//! ======
//! Preconditions are checked and the coordinator moved to in-flight inside
//! one store update, so two overlapping `submit` calls can never both pass
//! the gate. The images sent are the ones snapshotted at that moment.
//!
//! A result is applied only if the submission epoch is unchanged when it
//! lands; after a reset the late result is dropped and the caller sees
//! [`SubmissionError::Superseded`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::inference::types::{AnalysisResult, InferenceService};
use crate::state::submission::{SubmissionError, failure_detail};
use crate::store::WorkflowStore;

#[cfg(test)]
#[path = "submission_test.rs"]
mod tests;

#[derive(Clone)]
pub struct Submitter {
    store: Arc<WorkflowStore>,
    service: Arc<dyn InferenceService>,
}

impl Submitter {
    #[must_use]
    pub fn new(store: Arc<WorkflowStore>, service: Arc<dyn InferenceService>) -> Self {
        Self { store, service }
    }

    /// Submit every required image as one analysis request.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::AlreadyInFlight`], [`SubmissionError::MissingInput`],
    ///   or [`SubmissionError::Disconnected`] (checked in that order) if the
    ///   gate refuses; no request is made.
    /// - [`SubmissionError::Failed`] with the user-facing detail if the service fails.
    /// - [`SubmissionError::Superseded`] if the workflow was reset meanwhile.
    pub async fn submit(&self) -> Result<AnalysisResult, SubmissionError> {
        let begun = self.store.update_if(|state| {
            let begun = state.begin_submission();
            let changed = matches!(begun, Ok(_) | Err(SubmissionError::MissingInput { .. }));
            (begun, changed)
        });
        let (ticket, images) = match begun {
            Ok(begun) => begun,
            Err(e) => {
                info!(error = %e, "submission refused");
                return Err(e);
            }
        };

        info!(epoch = ticket.epoch(), images = images.len(), "submission started");
        let outcome = self.service.analyze(&images).await.map_err(|e| {
            warn!(epoch = ticket.epoch(), error = %e, "analysis failed");
            failure_detail(&e)
        });

        let applied = self.store.update_if(|state| {
            let applied = state.submission.complete(ticket, outcome.clone());
            (applied, applied)
        });
        if !applied {
            info!(epoch = ticket.epoch(), "late analysis result dropped");
            return Err(SubmissionError::Superseded);
        }

        info!(epoch = ticket.epoch(), succeeded = outcome.is_ok(), "submission finished");
        outcome.map_err(SubmissionError::Failed)
    }
}
