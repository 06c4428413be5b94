//! Headless demo driver.
//!
//! Runs a full annotation cycle against the in-memory gateway: fetch a
//! unit, configure the viewport from its image, paint a scripted stroke,
//! submit, and repeat until the queue is exhausted.

use spat::config::EngineConfig;
use spat::constants::ZOOM_STEP;
use spat::interaction::{HeldButtons, InteractionController, Modifiers, PointerEvent};
use spat::layer::{RedrawPolicy, SuperpixelLayer};
use spat::model::{AnnotationUnit, Feature, FlagStatus, MarkupState, Question, Study};
use spat::render::RecordingSurface;
use spat::segmentation::Segmentation;
use spat::synthetic::{InMemoryGateway, SyntheticImage};
use spat::viewport::{ContainerSize, MapViewport, PixelCoord};
use spat::workflow::{ImageMetadata, WorkflowDriver, WorkflowEvent};
use spat::EngineError;

fn main() {
    let config = EngineConfig::load_from_default_path().unwrap_or_default();
    env_logger::Builder::from_default_env()
        .filter_level(config.log_level.to_level_filter())
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_demo(&config)) {
        eprintln!("Demo error: {e}");
        std::process::exit(1);
    }
}

fn demo_study() -> Study {
    Study {
        id: "demo-study".to_string(),
        name: "Demo study".to_string(),
        questions: vec![
            Question::select("q-quality", "Image quality?", ["good", "poor"]),
            Question::select("q-diagnosis", "Compatible with diagnosis?", ["yes", "no"]),
        ],
        features: vec![
            Feature::new("f-network", "Pigment network"),
            Feature::new("f-globules", "Globules"),
        ],
    }
}

fn demo_gateway() -> InMemoryGateway {
    let gateway = InMemoryGateway::new(demo_study());
    for (i, side) in [512u32, 256].iter().enumerate() {
        gateway.push_unit(
            AnnotationUnit {
                id: format!("demo-annotation-{i}"),
                study_id: "demo-study".to_string(),
                image_id: format!("demo-image-{i}"),
            },
            SyntheticImage::new(*side, *side, 16),
        );
    }
    gateway
}

async fn run_demo(config: &EngineConfig) -> Result<(), EngineError> {
    let mut driver = WorkflowDriver::new(demo_gateway());
    driver.dispatch(WorkflowEvent::FetchNext {
        study_id: "demo-study".to_string(),
    });

    while let Some(event) = driver.next_completion().await {
        match event {
            WorkflowEvent::ImageReady {
                generation,
                metadata,
                segmentation,
            } if generation == driver.store().generation() => {
                annotate_image(&mut driver, metadata, segmentation, config)?;
            }
            WorkflowEvent::SubmitSucceeded { .. } => {
                driver.dispatch(WorkflowEvent::FetchNext {
                    study_id: "demo-study".to_string(),
                });
            }
            _ => {}
        }
    }

    let submissions = driver.gateway().submissions();
    log::info!(
        "workflow finished: {} annotations submitted, final state {}",
        submissions.len(),
        driver.store().submission_state().name()
    );
    for (annotation_id, payload) in &submissions {
        log::info!(
            "  {annotation_id}: {} responses, {} features marked, {} ms on image {}",
            payload.responses.len(),
            payload.markups.len(),
            payload.stop_time - payload.start_time,
            payload.image_id
        );
    }
    Ok(())
}

/// Configure the canvas for a fetched image, paint a scripted stroke and
/// submit the result.
fn annotate_image(
    driver: &mut WorkflowDriver<InMemoryGateway>,
    metadata: ImageMetadata,
    segmentation: Segmentation,
    config: &EngineConfig,
) -> Result<(), EngineError> {
    let mut viewport = MapViewport::new(
        metadata.size_x,
        metadata.size_y,
        ContainerSize::new(800.0, 600.0),
    )?;

    let policy = if config.redraw_coalesce_ms == 0 {
        RedrawPolicy::Immediate
    } else {
        RedrawPolicy::coalesced_ms(config.redraw_coalesce_ms)
    };
    let mut layer = SuperpixelLayer::new(segmentation, RecordingSurface::new(), policy);
    layer.activate(None, &mut viewport)?;

    let mut controller = InteractionController::new();
    controller.set_active_fill_value(MarkupState::Definite)?;

    // Zoom in one step toward the image center before painting.
    viewport.zoom_by(ZOOM_STEP);

    // Drag-paint a diagonal stroke across the lesion center.
    let (w, h) = (f64::from(metadata.size_x), f64::from(metadata.size_y));
    let start = PixelCoord::new(w * 0.35, h * 0.35);
    let _ = controller.handle_pointer(
        &PointerEvent::primary_down(viewport.project(start), Modifiers::default()),
        &viewport,
        &mut layer,
    )?;
    for step in 1..=20 {
        let t = f64::from(step) / 20.0;
        let pixel = PixelCoord::new(w * (0.35 + 0.3 * t), h * (0.35 + 0.3 * t));
        let _ = controller.handle_pointer(
            &PointerEvent::moved(
                viewport.project(pixel),
                HeldButtons::primary(),
                Modifiers::default(),
            ),
            &viewport,
            &mut layer,
        )?;
    }

    // Mark one uncertain region, then erase the stroke's starting region.
    controller.set_active_fill_value(MarkupState::Possible)?;
    let _ = controller.handle_pointer(
        &PointerEvent::primary_down(
            viewport.project(PixelCoord::new(w * 0.7, h * 0.3)),
            Modifiers::default(),
        ),
        &viewport,
        &mut layer,
    )?;
    let _ = controller.handle_pointer(
        &PointerEvent::primary_down(viewport.project(start), Modifiers::shift()),
        &viewport,
        &mut layer,
    )?;
    layer.flush_redraw();

    driver.dispatch(WorkflowEvent::SetActiveFeature {
        feature_id: Some("f-network".to_string()),
    });
    driver.dispatch(WorkflowEvent::RecordMarkup {
        feature_id: "f-network".to_string(),
        markup: layer.active_values().cloned(),
    });
    driver.dispatch(WorkflowEvent::RecordResponse {
        question_id: "q-quality".to_string(),
        answer: Some(serde_json::json!("good")),
    });
    driver.dispatch(WorkflowEvent::SetFlagStatus {
        status: FlagStatus::Ok,
    });
    driver.dispatch(WorkflowEvent::Submit);
    Ok(())
}
