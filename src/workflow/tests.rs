//! End-to-end workflow tests against the in-memory gateway.

use std::time::Duration;

use serde_json::json;

use crate::interaction::{InteractionController, Modifiers, PointerEvent};
use crate::layer::{RedrawPolicy, SuperpixelLayer};
use crate::model::{
    AnnotationUnit, Feature, MarkupState, Question, Study, SubmissionState,
};
use crate::render::RecordingSurface;
use crate::segmentation::Segmentation;
use crate::synthetic::{InMemoryGateway, SyntheticImage};
use crate::viewport::{ContainerSize, MapViewport, PixelCoord};
use crate::workflow::{ImageMetadata, WorkflowDriver, WorkflowEvent};

fn study() -> Study {
    Study {
        id: "study-1".to_string(),
        name: "Test study".to_string(),
        questions: vec![Question::select(
            "q1",
            "Image quality?",
            ["good", "poor"],
        )],
        features: vec![Feature::new("f1", "Pigment network")],
    }
}

fn unit(id: &str, image_id: &str) -> AnnotationUnit {
    AnnotationUnit {
        id: id.to_string(),
        study_id: "study-1".to_string(),
        image_id: image_id.to_string(),
    }
}

fn fetch_next() -> WorkflowEvent {
    WorkflowEvent::FetchNext {
        study_id: "study-1".to_string(),
    }
}

/// Pump completions until the current generation's image arrives.
async fn pump_until_image(
    driver: &mut WorkflowDriver<InMemoryGateway>,
) -> (ImageMetadata, Segmentation) {
    while let Some(event) = driver.next_completion().await {
        if let WorkflowEvent::ImageReady {
            generation,
            metadata,
            segmentation,
        } = event
        {
            if generation == driver.store().generation() {
                return (metadata, segmentation);
            }
        }
    }
    panic!("image never arrived");
}

#[tokio::test]
async fn test_full_annotation_cycle() {
    let gateway = InMemoryGateway::new(study());
    gateway.push_unit(unit("ann-1", "img-1"), SyntheticImage::new(32, 32, 8));
    gateway.push_unit(unit("ann-2", "img-2"), SyntheticImage::new(32, 32, 8));

    let mut driver = WorkflowDriver::new(gateway);
    driver.dispatch(fetch_next());
    let (metadata, segmentation) = pump_until_image(&mut driver).await;
    driver.run_until_idle().await;

    assert_eq!(driver.store().session().unwrap().annotation_id, "ann-1");
    assert_eq!(driver.store().questions().len(), 1);
    assert_eq!(driver.store().features().len(), 1);

    // Configure the canvas from the fetched image and paint one region.
    let mut viewport = MapViewport::new(
        metadata.size_x,
        metadata.size_y,
        ContainerSize::new(512.0, 512.0),
    )
    .unwrap();
    let mut layer =
        SuperpixelLayer::new(segmentation, RecordingSurface::new(), RedrawPolicy::Immediate);
    layer.activate(None, &mut viewport).unwrap();

    let controller = InteractionController::new();
    let position = viewport.project(PixelCoord::new(12.5, 4.5));
    let action = controller
        .handle_pointer(
            &PointerEvent::primary_down(position, Modifiers::default()),
            &viewport,
            &mut layer,
        )
        .unwrap()
        .expect("pointer over the image paints");
    assert_eq!(action.index, 1);

    driver.dispatch(WorkflowEvent::RecordMarkup {
        feature_id: "f1".to_string(),
        markup: layer.active_values().cloned(),
    });
    driver.dispatch(WorkflowEvent::RecordResponse {
        question_id: "q1".to_string(),
        answer: Some(json!("good")),
    });
    driver.dispatch(WorkflowEvent::Submit);
    driver.run_until_idle().await;
    assert_eq!(
        driver.store().submission_state(),
        SubmissionState::Submitted
    );

    // Second unit: submit without any markup, then drain the queue.
    driver.dispatch(fetch_next());
    let _ = pump_until_image(&mut driver).await;
    driver.run_until_idle().await;
    assert_eq!(driver.store().session().unwrap().annotation_id, "ann-2");

    driver.dispatch(WorkflowEvent::Submit);
    driver.run_until_idle().await;
    driver.dispatch(fetch_next());
    driver.run_until_idle().await;
    assert!(driver.store().is_finished());

    // A finished workflow makes no further fetch attempts.
    driver.dispatch(fetch_next());
    assert!(!driver.has_inflight());
}

#[tokio::test]
async fn test_submitted_payloads() {
    let gateway = InMemoryGateway::new(study());
    gateway.push_unit(unit("ann-1", "img-1"), SyntheticImage::new(16, 16, 4));

    let mut driver = WorkflowDriver::new(gateway);
    driver.dispatch(fetch_next());
    let (_, segmentation) = pump_until_image(&mut driver).await;
    driver.run_until_idle().await;

    let mut viewport =
        MapViewport::new(16, 16, ContainerSize::new(256.0, 256.0)).unwrap();
    let mut layer =
        SuperpixelLayer::new(segmentation, RecordingSurface::new(), RedrawPolicy::Immediate);
    layer.activate(None, &mut viewport).unwrap();
    layer.set_value(5, MarkupState::Possible).unwrap();

    driver.dispatch(WorkflowEvent::RecordMarkup {
        feature_id: "f1".to_string(),
        markup: layer.active_values().cloned(),
    });
    // A retracted answer never reaches the wire.
    driver.dispatch(WorkflowEvent::RecordResponse {
        question_id: "q1".to_string(),
        answer: Some(json!("good")),
    });
    driver.dispatch(WorkflowEvent::RecordResponse {
        question_id: "q1".to_string(),
        answer: None,
    });
    driver.dispatch(WorkflowEvent::Submit);
    driver.run_until_idle().await;
    assert_eq!(
        driver.store().submission_state(),
        SubmissionState::Submitted
    );

    let submissions = driver.gateway().submissions();
    assert_eq!(submissions.len(), 1);
    let (annotation_id, payload) = &submissions[0];
    assert_eq!(annotation_id, "ann-1");
    assert_eq!(payload.image_id, "img-1");
    assert!(payload.responses.is_empty());
    assert!(payload.responses.values().all(|v| !v.is_null()));
    assert_eq!(
        payload.markups["f1"].get(5),
        Some(MarkupState::Possible)
    );
    assert!(payload.stop_time >= payload.start_time);
}

#[tokio::test(start_paused = true)]
async fn test_late_image_for_superseded_fetch_is_discarded() {
    let gateway = InMemoryGateway::new(study());
    gateway.push_unit(unit("ann-1", "img-slow"), SyntheticImage::new(16, 16, 4));
    gateway.push_unit(unit("ann-2", "img-fast"), SyntheticImage::new(8, 8, 4));
    gateway.delay_image("img-slow", Duration::from_millis(100));

    let mut driver = WorkflowDriver::new(gateway);
    driver.dispatch(fetch_next());

    // Wait for the first unit; its (slow) image fetch starts now.
    loop {
        match driver.next_completion().await {
            Some(WorkflowEvent::AnnotationFetched { unit, .. }) => {
                assert_eq!(unit.id, "ann-1");
                break;
            }
            Some(_) => continue,
            None => panic!("first unit never arrived"),
        }
    }

    // Skip ahead before the image lands; this supersedes generation 1.
    driver.dispatch(fetch_next());
    driver.run_until_idle().await;

    // The late img-slow response was discarded, not applied.
    assert_eq!(driver.store().session().unwrap().image_id, "img-fast");
    assert_eq!(driver.store().image_metadata().unwrap().size_x, 8);
}

#[tokio::test]
async fn test_submit_failure_surfaces_failed_then_retry_succeeds() {
    let gateway = InMemoryGateway::new(study());
    gateway.push_unit(unit("ann-1", "img-1"), SyntheticImage::new(16, 16, 4));
    gateway.fail_next_submit();

    let mut driver = WorkflowDriver::new(gateway);
    driver.dispatch(fetch_next());
    driver.run_until_idle().await;

    driver.dispatch(WorkflowEvent::Submit);
    driver.run_until_idle().await;
    assert_eq!(driver.store().submission_state(), SubmissionState::Failed);
    assert!(!driver.store().is_finished());

    driver.dispatch(WorkflowEvent::Submit);
    driver.run_until_idle().await;
    assert_eq!(
        driver.store().submission_state(),
        SubmissionState::Submitted
    );
}

#[tokio::test]
async fn test_empty_queue_finishes_immediately() {
    let gateway = InMemoryGateway::new(study());
    let mut driver = WorkflowDriver::new(gateway);

    driver.dispatch(fetch_next());
    driver.run_until_idle().await;
    assert!(driver.store().is_finished());
    assert!(driver.store().session().is_none());
}
