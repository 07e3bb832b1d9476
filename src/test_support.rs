//! Scripted inference service for driving the workflow in tests.
//!
//! Replies are queued per endpoint. A reply is either immediate or gated on
//! a oneshot the test resolves later, which lets a test hold a request open
//! while it performs other operations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio::sync::oneshot;

use crate::inference::types::{AnalysisResult, HealthReport, ImageFile, InferenceError, InferenceService, MaskPreviewData};
use crate::state::{SlotKey, WorkflowState};

pub(crate) type Reply<T> = Result<T, InferenceError>;

enum Scripted<T> {
    Now(Reply<T>),
    Gated(oneshot::Receiver<Reply<T>>),
}

struct Queue<T> {
    replies: Mutex<VecDeque<Scripted<T>>>,
    calls: AtomicUsize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self { replies: Mutex::new(VecDeque::new()), calls: AtomicUsize::new(0) }
    }
}

impl<T> Queue<T> {
    fn push(&self, reply: Scripted<T>) {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).push_back(reply);
    }

    fn now(&self, reply: Reply<T>) {
        self.push(Scripted::Now(reply));
    }

    fn gate(&self) -> oneshot::Sender<Reply<T>> {
        let (tx, rx) = oneshot::channel();
        self.push(Scripted::Gated(rx));
        tx
    }

    async fn next(&self, fallback: impl FnOnce() -> Reply<T>) -> Reply<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.replies.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match scripted {
            Some(Scripted::Now(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(InferenceError::Request("gate dropped".into()))),
            None => fallback(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Health defaults to ready; previews and analyses default to a transport
/// failure so an unscripted call is visible in assertions.
#[derive(Default)]
pub(crate) struct ScriptedService {
    health: Queue<HealthReport>,
    previews: Queue<MaskPreviewData>,
    analyses: Queue<AnalysisResult>,
    analyzed: Mutex<Vec<Vec<(SlotKey, String)>>>,
}

impl ScriptedService {
    pub(crate) fn health_now(&self, reply: Reply<HealthReport>) {
        self.health.now(reply);
    }

    pub(crate) fn health_gate(&self) -> oneshot::Sender<Reply<HealthReport>> {
        self.health.gate()
    }

    pub(crate) fn preview_now(&self, reply: Reply<MaskPreviewData>) {
        self.previews.now(reply);
    }

    pub(crate) fn preview_gate(&self) -> oneshot::Sender<Reply<MaskPreviewData>> {
        self.previews.gate()
    }

    pub(crate) fn analysis_now(&self, reply: Reply<AnalysisResult>) {
        self.analyses.now(reply);
    }

    pub(crate) fn analysis_gate(&self) -> oneshot::Sender<Reply<AnalysisResult>> {
        self.analyses.gate()
    }

    pub(crate) fn health_calls(&self) -> usize {
        self.health.calls()
    }

    pub(crate) fn preview_calls(&self) -> usize {
        self.previews.calls()
    }

    pub(crate) fn analyze_calls(&self) -> usize {
        self.analyses.calls()
    }

    /// Slot and file name of every image sent, one entry per analyze call.
    pub(crate) fn analyzed(&self) -> Vec<Vec<(SlotKey, String)>> {
        self.analyzed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait::async_trait]
impl InferenceService for ScriptedService {
    async fn health(&self) -> Result<HealthReport, InferenceError> {
        self.health.next(|| Ok(ready())).await
    }

    async fn preview_mask(&self, _image: &ImageFile) -> Result<MaskPreviewData, InferenceError> {
        self.previews
            .next(|| Err(InferenceError::Request("no scripted preview".into())))
            .await
    }

    async fn analyze(&self, images: &[(SlotKey, ImageFile)]) -> Result<AnalysisResult, InferenceError> {
        let sent = images.iter().map(|(slot, image)| (*slot, image.file_name.clone())).collect();
        self.analyzed.lock().unwrap_or_else(PoisonError::into_inner).push(sent);
        self.analyses
            .next(|| Err(InferenceError::Request("no scripted analysis".into())))
            .await
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

pub(crate) fn ready() -> HealthReport {
    HealthReport { status: "healthy".into(), model_loaded: true, timestamp: None }
}

pub(crate) fn not_ready() -> HealthReport {
    HealthReport { status: "healthy".into(), model_loaded: false, timestamp: None }
}

pub(crate) fn unreachable() -> InferenceError {
    InferenceError::Request("connection refused".into())
}

pub(crate) fn mask(tag: &'static str) -> MaskPreviewData {
    MaskPreviewData { preview_image: Bytes::from_static(tag.as_bytes()), mask_image: Bytes::from_static(b"mask") }
}

pub(crate) fn jpeg(name: &str) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0xFF_u8; 1024])
}

pub(crate) fn analysis() -> AnalysisResult {
    AnalysisResult::new(json!({
        "model": "Model V1 (EfficientNet-B3)",
        "measurements": { "chest": 96.5, "waist": 81.0 },
    }))
}

/// Wait until `pred` holds for the state behind `rx`, failing after a few seconds.
pub(crate) async fn wait_until<F, P>(mut rx: tokio::sync::watch::Receiver<u64>, snapshot: F, pred: P)
where
    F: Fn() -> WorkflowState,
    P: Fn(&WorkflowState) -> bool,
{
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&snapshot()) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "workflow state never reached the expected condition");
}
