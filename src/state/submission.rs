//! Submission state — the single analysis lifecycle for the whole workflow.
//!
//! DESIGN
//! ======
//! Each accepted submission gets a fresh epoch. A completion is applied
//! only if its epoch is still current and the coordinator is still
//! `InFlight`; `reset` bumps the epoch so a late response from an
//! abandoned submission cannot resurrect a result.

use crate::inference::types::{AnalysisResult, InferenceError};
use crate::state::slot::SlotKey;

pub const MISSING_ALL_MESSAGE: &str = "Please upload both front and side images";
pub const REJECTED_FALLBACK_MESSAGE: &str = "Analysis failed. Please try again.";
pub const TRANSPORT_FALLBACK_MESSAGE: &str = "Failed to analyze images. Please check your backend server.";

#[cfg(test)]
#[path = "submission_test.rs"]
mod tests;

/// Lifecycle of the one workflow-wide submission.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SubmissionState {
    #[default]
    Idle,
    /// Preconditions are being checked; the request has not been issued.
    Validating,
    InFlight,
    Succeeded(AnalysisResult),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("{}", missing_message(.missing))]
    MissingInput { missing: Vec<SlotKey> },
    #[error("a submission is already in flight")]
    AlreadyInFlight,
    #[error("analysis service is not connected")]
    Disconnected,
    #[error("{0}")]
    Failed(String),
    #[error("submission was reset before it completed")]
    Superseded,
}

fn missing_message(missing: &[SlotKey]) -> String {
    if missing.len() >= SlotKey::REQUIRED.len() {
        return MISSING_ALL_MESSAGE.to_owned();
    }
    let names: Vec<&str> = missing.iter().map(|slot| slot.as_str()).collect();
    format!("Please upload the {} image", names.join(" and "))
}

/// Human-readable failure detail: the service's own error field first,
/// then the transport message, then a fixed fallback.
#[must_use]
pub fn failure_detail(err: &InferenceError) -> String {
    if let Some(message) = err.service_message() {
        return message.to_owned();
    }
    if matches!(err, InferenceError::Rejected { .. }) {
        return REJECTED_FALLBACK_MESSAGE.to_owned();
    }
    let text = err.to_string();
    if text.trim().is_empty() { TRANSPORT_FALLBACK_MESSAGE.to_owned() } else { text }
}

/// Handle for one issued analysis request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionTicket {
    epoch: u64,
}

impl SubmissionTicket {
    #[must_use]
    pub fn epoch(self) -> u64 {
        self.epoch
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubmissionCoordinator {
    state: SubmissionState,
    epoch: u64,
}

impl SubmissionCoordinator {
    #[must_use]
    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.state == SubmissionState::InFlight
    }

    #[must_use]
    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            SubmissionState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SubmissionState::Failed(detail) => Some(detail),
            _ => None,
        }
    }

    /// Validate and move to `InFlight`, discarding any previous result.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::AlreadyInFlight`] leaves the state untouched.
    /// - [`SubmissionError::MissingInput`] records a `Failed` state; no
    ///   request may be issued.
    pub fn begin(&mut self, missing: &[SlotKey]) -> Result<SubmissionTicket, SubmissionError> {
        if self.is_in_flight() {
            return Err(SubmissionError::AlreadyInFlight);
        }
        self.state = SubmissionState::Validating;
        if !missing.is_empty() {
            return Err(self.reject_missing(missing));
        }
        self.epoch += 1;
        self.state = SubmissionState::InFlight;
        Ok(SubmissionTicket { epoch: self.epoch })
    }

    /// Record a missing-input refusal as `Failed` with its user text.
    /// Only valid while nothing is in flight.
    pub(crate) fn reject_missing(&mut self, missing: &[SlotKey]) -> SubmissionError {
        let err = SubmissionError::MissingInput { missing: missing.to_vec() };
        self.state = SubmissionState::Failed(err.to_string());
        err
    }

    /// Apply the analysis outcome. Returns `false` if the ticket is stale.
    pub fn complete(&mut self, ticket: SubmissionTicket, outcome: Result<AnalysisResult, String>) -> bool {
        if ticket.epoch != self.epoch || !self.is_in_flight() {
            return false;
        }
        self.state = match outcome {
            Ok(result) => SubmissionState::Succeeded(result),
            Err(detail) => SubmissionState::Failed(detail),
        };
        true
    }

    /// Back to `Idle`; any in-flight request's eventual outcome is dropped.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state = SubmissionState::Idle;
    }
}
