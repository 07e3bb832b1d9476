use std::time::Duration;

use super::*;
use crate::state::submission::SubmissionState;
use crate::state::workflow::PREVIEW_FAILED_MESSAGE;
use crate::test_support::{ScriptedService, analysis, jpeg, mask, not_ready, unreachable, wait_until};

fn controller() -> (WorkflowController, Arc<ScriptedService>) {
    let service = Arc::new(ScriptedService::default());
    let config = WorkflowConfig { health_poll_interval: Duration::from_millis(20), ..WorkflowConfig::default() };
    (WorkflowController::new(service.clone(), config), service)
}

async fn wait(controller: &WorkflowController, pred: impl Fn(&WorkflowState) -> bool) {
    wait_until(controller.subscribe(), || controller.snapshot(), pred).await;
}

async fn connected() -> (WorkflowController, Arc<ScriptedService>) {
    let (controller, service) = controller();
    controller.start();
    wait(&controller, |state| state.connectivity().is_connected()).await;
    (controller, service)
}

// =============================================================
// End-to-end flows
// =============================================================

#[tokio::test]
async fn happy_path_select_accept_submit() {
    let (controller, service) = connected().await;
    service.preview_now(Ok(mask("front")));
    service.preview_now(Ok(mask("side")));
    service.analysis_now(Ok(analysis()));

    let front = controller.select_image(SlotKey::Front, jpeg("front.jpg")).unwrap();
    assert_eq!(front.await.unwrap(), PreviewOutcome::Attached);
    controller.accept_preview(SlotKey::Front).unwrap();

    let side = controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap();
    assert_eq!(side.await.unwrap(), PreviewOutcome::Attached);
    controller.accept_preview(SlotKey::Side).unwrap();

    assert!(controller.can_submit());
    let result = controller.submit().await.unwrap();
    assert_eq!(result.model(), Some("Model V1 (EfficientNet-B3)"));

    let state = controller.snapshot();
    assert_eq!(state.submission().state(), &SubmissionState::Succeeded(analysis()));
    assert!(state.slot(SlotKey::Front).mask_accepted());
    assert_eq!(service.preview_calls(), 2);
    assert_eq!(service.analyze_calls(), 1);
    controller.stop();
}

#[tokio::test]
async fn retry_empties_slot_and_blocks_submission() {
    let (controller, service) = connected().await;
    service.preview_now(Ok(mask("front")));
    service.preview_now(Ok(mask("side")));

    controller.select_image(SlotKey::Front, jpeg("front.jpg")).unwrap().await.unwrap();
    controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap().await.unwrap();
    controller.retry_preview(SlotKey::Side).unwrap();

    assert!(!controller.snapshot().slot(SlotKey::Side).has_image());
    assert!(!controller.can_submit());
    let err = controller.submit().await.unwrap_err();
    assert_eq!(err, SubmissionError::MissingInput { missing: vec![SlotKey::Side] });
    assert_eq!(service.analyze_calls(), 0);
}

#[tokio::test]
async fn accept_without_preview_is_refused() {
    let (controller, _service) = controller();
    assert_eq!(controller.accept_preview(SlotKey::Front), Err(SlotError::NoPendingPreview(SlotKey::Front)));
    assert_eq!(controller.retry_preview(SlotKey::Side), Err(SlotError::NoPendingPreview(SlotKey::Side)));
}

#[tokio::test]
async fn failed_preview_still_allows_submission() {
    let (controller, service) = connected().await;
    service.preview_now(Ok(mask("front")));
    service.preview_now(Err(unreachable()));
    service.analysis_now(Ok(analysis()));

    controller.select_image(SlotKey::Front, jpeg("front.jpg")).unwrap().await.unwrap();
    let side = controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap();
    assert_eq!(side.await.unwrap(), PreviewOutcome::Failed);
    assert_eq!(controller.snapshot().advisory(), Some(PREVIEW_FAILED_MESSAGE));

    assert!(controller.submit().await.is_ok());
}

#[tokio::test]
async fn invalid_file_is_rejected_locally() {
    let (controller, service) = connected().await;
    let err = controller
        .select_image(SlotKey::Front, ImageFile::new("notes.txt", "text/plain", vec![1, 2, 3]))
        .unwrap_err();
    assert_eq!(err.to_string(), "Please upload a valid image file");
    assert_eq!(controller.snapshot().advisory(), Some("Please upload a valid image file"));
    assert_eq!(service.preview_calls(), 0);
}

// =============================================================
// Races
// =============================================================

#[tokio::test]
async fn reselect_discards_earlier_preview() {
    let (controller, service) = controller();
    let first_gate = service.preview_gate();
    service.preview_now(Ok(mask("second")));

    let first = controller.select_image(SlotKey::Front, jpeg("a.jpg")).unwrap();
    while service.preview_calls() == 0 {
        tokio::task::yield_now().await;
    }
    let second = controller.select_image(SlotKey::Front, jpeg("b.jpg")).unwrap();
    assert_eq!(second.await.unwrap(), PreviewOutcome::Attached);

    first_gate.send(Ok(mask("first"))).unwrap();
    assert_eq!(first.await.unwrap(), PreviewOutcome::Stale);
    let state = controller.snapshot();
    let slot = state.slot(SlotKey::Front);
    assert_eq!(slot.raw_image().map(|image| image.file_name.as_str()), Some("b.jpg"));
    assert_eq!(slot.mask_preview(), Some(&mask("second")));
}

#[tokio::test]
async fn processing_indicator_follows_request() {
    let (controller, service) = controller();
    let gate = service.preview_gate();

    let handle = controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap();
    assert!(controller.snapshot().is_processing_preview());
    gate.send(Ok(mask("side"))).unwrap();
    handle.await.unwrap();
    assert!(!controller.snapshot().is_processing_preview());
}

#[tokio::test]
async fn double_submit_makes_one_request() {
    let (controller, service) = connected().await;
    service.preview_now(Ok(mask("front")));
    service.preview_now(Ok(mask("side")));
    controller.select_image(SlotKey::Front, jpeg("front.jpg")).unwrap().await.unwrap();
    controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap().await.unwrap();
    let gate = service.analysis_gate();

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    wait(&controller, |state| state.submission().is_in_flight()).await;
    assert!(!controller.can_submit());
    assert_eq!(controller.submit().await, Err(SubmissionError::AlreadyInFlight));

    gate.send(Ok(analysis())).unwrap();
    assert!(first.await.unwrap().is_ok());
    assert_eq!(service.analyze_calls(), 1);
}

#[tokio::test]
async fn reset_during_submission_drops_result() {
    let (controller, service) = connected().await;
    service.preview_now(Ok(mask("front")));
    service.preview_now(Ok(mask("side")));
    controller.select_image(SlotKey::Front, jpeg("front.jpg")).unwrap().await.unwrap();
    controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap().await.unwrap();
    let gate = service.analysis_gate();

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    wait(&controller, |state| state.submission().is_in_flight()).await;
    controller.reset_all();

    gate.send(Ok(analysis())).unwrap();
    assert_eq!(pending.await.unwrap(), Err(SubmissionError::Superseded));
    let state = controller.snapshot();
    assert_eq!(state.submission().state(), &SubmissionState::Idle);
    assert!(!state.has_input());
    assert!(state.connectivity().is_connected());
}

// =============================================================
// Connectivity
// =============================================================

#[tokio::test]
async fn submission_refused_while_disconnected() {
    let (controller, service) = connected().await;
    service.preview_now(Ok(mask("front")));
    service.preview_now(Ok(mask("side")));
    controller.select_image(SlotKey::Front, jpeg("front.jpg")).unwrap().await.unwrap();
    controller.select_image(SlotKey::Side, jpeg("side.jpg")).unwrap().await.unwrap();
    assert!(controller.can_submit());

    service.health_now(Ok(not_ready()));
    assert_eq!(controller.check_connectivity().await, Some(ConnectivityState::Disconnected));
    assert!(!controller.can_submit());
    assert_eq!(controller.submit().await, Err(SubmissionError::Disconnected));
    assert_eq!(service.analyze_calls(), 0);

    // Polling resumes while disconnected and picks the service back up.
    wait(&controller, |state| state.connectivity().is_connected()).await;
    assert!(controller.can_submit());
    controller.stop();
}

#[tokio::test]
async fn reset_keeps_monitor_running() {
    let (controller, _service) = connected().await;
    controller.reset_all();
    assert!(controller.snapshot().connectivity().is_connected());
    assert!(controller.inner.monitor.is_running());
    controller.stop();
    assert!(!controller.inner.monitor.is_running());
}
