//! Async drivers over the shared workflow store.
//!
//! Each driver owns one kind of remote call and applies its outcome to
//! the store through a single transition. [`WorkflowController`] bundles
//! them behind the public command surface.

pub mod monitor;
pub mod preview;
pub mod submission;
pub mod workflow;

pub use monitor::ConnectivityMonitor;
pub use preview::PreviewPipeline;
pub use submission::Submitter;
pub use workflow::WorkflowController;
