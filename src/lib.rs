//! Client-side capture workflow for a remote body-measurement model.
//!
//! ARCHITECTURE
//! ============
//! - `state`: pure state machines (slots, connectivity, submission) and
//!   the composed [`state::WorkflowState`].
//! - `store`: the single mutable cell holding that state, with change
//!   notification.
//! - `services`: async drivers (health monitor, preview pipeline,
//!   submitter) and the [`services::WorkflowController`] facade.
//! - `inference`: the [`inference::InferenceService`] seam and its HTTP
//!   implementation.
//! - `config`: environment-driven settings.

pub mod config;
pub mod inference;
pub mod services;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
