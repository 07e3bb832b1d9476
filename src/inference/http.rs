//! HTTP client for the inference service.
//!
//! Thin reqwest wrapper over the health, preview-mask, and analysis
//! endpoints. Pure parsing in `parse_*` for testability.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{
    AnalysisResult, HealthReport, ImageFile, InferenceError, InferenceService, MaskPreviewData, ModelInfo,
    decode_image_payload,
};
use crate::config::ServiceConfig;
use crate::state::slot::SlotKey;

const HEALTH_PATH: &str = "/health";
const PREVIEW_MASK_PATH: &str = "/preview-mask";
const ANALYSIS_PATH: &str = "/complete-analysis";
const MODEL_INFO_PATH: &str = "/model-info";
const SWITCH_MODEL_PATH: &str = "/switch-model";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpInferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpInferenceClient {
    /// Build a client from service config.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::HttpClientBuild`] if reqwest rejects the settings.
    pub fn new(config: &ServiceConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| InferenceError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch metadata about the loaded model and the alternatives.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] on transport failure or `success: false`.
    pub async fn model_info(&self) -> Result<ModelInfo, InferenceError> {
        let (status, text) = self.send(self.http.get(self.url(MODEL_INFO_PATH))).await?;
        parse_envelope::<Value>(status, &text).map(ModelInfo::new)
    }

    /// Ask the service to hot-swap its model.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] on transport failure or `success: false`.
    pub async fn switch_model(&self, model_name: &str) -> Result<Value, InferenceError> {
        let body = serde_json::json!({ "model_name": model_name });
        let (status, text) = self
            .send(self.http.post(self.url(SWITCH_MODEL_PATH)).json(&body))
            .await?;
        parse_envelope(status, &text)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), InferenceError> {
        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;
        Ok((status, text))
    }
}

fn image_part(image: &ImageFile) -> Result<Part, InferenceError> {
    Part::stream(reqwest::Body::from(image.bytes.clone()))
        .file_name(image.file_name.clone())
        .mime_str(&image.media_type)
        .map_err(|e| InferenceError::Request(e.to_string()))
}

#[async_trait::async_trait]
impl InferenceService for HttpInferenceClient {
    async fn health(&self) -> Result<HealthReport, InferenceError> {
        let (status, text) = self.send(self.http.get(self.url(HEALTH_PATH))).await?;
        parse_health(status, &text)
    }

    async fn preview_mask(&self, image: &ImageFile) -> Result<MaskPreviewData, InferenceError> {
        let form = Form::new().part("image", image_part(image)?);
        let (status, text) = self
            .send(self.http.post(self.url(PREVIEW_MASK_PATH)).multipart(form))
            .await?;
        parse_preview(status, &text)
    }

    async fn analyze(&self, images: &[(SlotKey, ImageFile)]) -> Result<AnalysisResult, InferenceError> {
        let mut form = Form::new();
        for (slot, image) in images {
            form = form.part(slot.field_name(), image_part(image)?);
        }
        let (status, text) = self
            .send(self.http.post(self.url(ANALYSIS_PATH)).multipart(form))
            .await?;
        parse_envelope::<Value>(status, &text).map(AnalysisResult::new)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct PreviewPayload {
    preview: String,
    mask: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn status_error(status: u16, text: &str) -> InferenceError {
    let error = serde_json::from_str::<ErrorBody>(text)
        .ok()
        .and_then(|body| body.error);
    InferenceError::Response { status, error }
}

fn parse_health(status: u16, text: &str) -> Result<HealthReport, InferenceError> {
    if !is_success(status) {
        return Err(status_error(status, text));
    }
    serde_json::from_str(text).map_err(|e| InferenceError::Parse(e.to_string()))
}

fn parse_envelope<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, InferenceError> {
    if !is_success(status) {
        return Err(status_error(status, text));
    }
    let envelope: Envelope<T> = serde_json::from_str(text).map_err(|e| InferenceError::Parse(e.to_string()))?;
    if !envelope.success {
        return Err(InferenceError::Rejected { error: envelope.error });
    }
    envelope
        .data
        .ok_or_else(|| InferenceError::Parse("success response without data".into()))
}

fn parse_preview(status: u16, text: &str) -> Result<MaskPreviewData, InferenceError> {
    let payload: PreviewPayload = parse_envelope(status, text)?;
    Ok(MaskPreviewData {
        preview_image: decode_image_payload(&payload.preview)?,
        mask_image: decode_image_payload(&payload.mask)?,
    })
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
