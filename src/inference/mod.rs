//! Inference service boundary.
//!
//! DESIGN
//! ======
//! The workflow talks to the remote model service only through the
//! [`InferenceService`] trait: health probe, mask preview, and the final
//! multi-image analysis. [`HttpInferenceClient`] is the production
//! implementation; tests substitute a scripted one.

pub mod http;
pub mod types;

pub use http::HttpInferenceClient;
pub use types::{
    AnalysisResult, HealthReport, ImageFile, InferenceError, InferenceService, MaskPreviewData, Measurement, ModelInfo,
};
