//! Workflow state machines.
//!
//! ARCHITECTURE
//! ============
//! Each component owns one explicit state object changed only through
//! named transition methods. Nothing here performs I/O or awaits; the
//! drivers in `services` call these transitions between network calls.

pub mod connectivity;
pub mod slot;
pub mod submission;
pub mod workflow;

pub use connectivity::{ConnectivityState, ConnectivityStatus};
pub use slot::{ImageSlot, PreviewOutcome, SlotError, SlotKey, ValidationError};
pub use submission::{SubmissionError, SubmissionState};
pub use workflow::WorkflowState;
