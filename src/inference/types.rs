//! Inference service types — payloads, results, and errors.
//!
//! The workflow only depends on the success/failure shape of each call;
//! transport encoding lives in [`super::http`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::slot::SlotKey;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by inference service calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (connect failure, timeout, ...).
    #[error("{0}")]
    Request(String),

    /// The service returned a non-success HTTP status.
    #[error("Request failed with status code {status}")]
    Response { status: u16, error: Option<String> },

    /// The service answered `success: false`.
    #[error("service reported failure")]
    Rejected { error: Option<String> },

    /// The response body could not be interpreted.
    #[error("response parse failed: {0}")]
    Parse(String),
}

impl InferenceError {
    /// The structured `error` field the service attached, if any.
    #[must_use]
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Response { error, .. } | Self::Rejected { error } => error.as_deref().filter(|e| !e.trim().is_empty()),
            _ => None,
        }
    }
}

// =============================================================================
// IMAGE PAYLOADS
// =============================================================================

/// A user-selected image: declared media type plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { file_name: file_name.into(), media_type: media_type.into(), bytes: bytes.into() }
    }

    /// Size of the raw image in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Guess a media type from a file name's extension.
    #[must_use]
    pub fn media_type_for(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            _ => "application/octet-stream",
        }
    }
}

/// Background-removed preview and binary mask for one selected image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPreviewData {
    pub preview_image: Bytes,
    pub mask_image: Bytes,
}

/// Decode an image the service sent as a `data:` URL (or bare base64).
pub(crate) fn decode_image_payload(raw: &str) -> Result<Bytes, InferenceError> {
    let encoded = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| InferenceError::Parse("data URL without payload".into()))?;
            if !meta.ends_with(";base64") {
                return Err(InferenceError::Parse(format!("unsupported data URL encoding: {meta}")));
            }
            data
        }
        None => raw,
    };
    STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|e| InferenceError::Parse(format!("invalid base64 image payload: {e}")))
}

// =============================================================================
// HEALTH
// =============================================================================

/// Body of the health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthReport {
    /// Ready means healthy *and* a model is loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == "healthy" && self.model_loaded
    }
}

// =============================================================================
// ANALYSIS RESULT
// =============================================================================

/// Opaque analysis payload. The workflow forwards it untouched; the
/// accessors below exist for presentation only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(Value);

impl AnalysisResult {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Name of the model that produced the result.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    /// Plausibility warnings attached by the service (`null` means none).
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.0
            .get("warnings")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Measurement entries, skipping any without a numeric value.
    #[must_use]
    pub fn measurements(&self) -> Vec<Measurement> {
        let Some(map) = self.0.get("measurements").and_then(Value::as_object) else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(key, entry)| Measurement::from_entry(key, entry))
            .collect()
    }
}

/// One body measurement as reported by the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub key: String,
    pub value: f64,
    pub unit: String,
    pub display: Option<String>,
}

impl Measurement {
    fn from_entry(key: &str, entry: &Value) -> Option<Self> {
        if let Some(value) = entry.as_f64() {
            return Some(Self { key: key.to_owned(), value, unit: "cm".into(), display: None });
        }
        let value = entry.get("value").and_then(Value::as_f64)?;
        let unit = entry
            .get("unit")
            .and_then(Value::as_str)
            .unwrap_or("cm")
            .to_owned();
        let display = entry
            .get("display")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Some(Self { key: key.to_owned(), value, unit, display })
    }

    /// Human label: `shoulder-to-crotch` becomes `shoulder to crotch`.
    #[must_use]
    pub fn label(&self) -> String {
        self.key.replace('-', " ")
    }

    /// Service-provided display text, else the value to one decimal place.
    #[must_use]
    pub fn display_text(&self) -> String {
        match &self.display {
            Some(display) => display.clone(),
            None => format!("{:.1} {}", self.value, self.unit),
        }
    }
}

// =============================================================================
// MODEL INFO
// =============================================================================

/// Model metadata returned by the model-info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelInfo(Value);

impl ModelInfo {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn current_model(&self) -> Option<&str> {
        self.0.get("current_model").and_then(Value::as_str)
    }

    /// Available model names, whether listed as an array or as map keys.
    #[must_use]
    pub fn available_models(&self) -> Vec<String> {
        match self.0.get("available_models") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// SERVICE TRAIT
// =============================================================================

/// The remote inference service as seen by the workflow. Enables mocking in tests.
#[async_trait::async_trait]
pub trait InferenceService: Send + Sync {
    /// Probe service readiness.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] if the probe cannot be completed.
    async fn health(&self) -> Result<HealthReport, InferenceError>;

    /// Generate a background-removed preview and mask for one image.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] on transport failure or `success: false`.
    async fn preview_mask(&self, image: &ImageFile) -> Result<MaskPreviewData, InferenceError>;

    /// Analyze all required images together as one unit.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] on transport failure or `success: false`.
    async fn analyze(&self, images: &[(SlotKey, ImageFile)]) -> Result<AnalysisResult, InferenceError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
