//! Async driver connecting the workflow store to a network gateway.
//!
//! The store stays pure: it emits effects, the driver executes them as
//! spawned tasks on the cooperative runtime and feeds their results back in
//! as events. Every effect result carries the generation tag of the request
//! that caused it, so the store can discard completions for superseded
//! requests; the driver never cancels in-flight work.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::workflow::gateway::NetworkGateway;
use crate::workflow::store::{AnnotationWorkflowStore, WorkflowEffect, WorkflowEvent};

/// Executes workflow effects and pumps completion events.
pub struct WorkflowDriver<G> {
    store: AnnotationWorkflowStore,
    gateway: Arc<G>,
    tx: mpsc::UnboundedSender<WorkflowEvent>,
    rx: mpsc::UnboundedReceiver<WorkflowEvent>,
    inflight: usize,
}

impl<G: NetworkGateway + 'static> WorkflowDriver<G> {
    /// Create a driver over a fresh store.
    pub fn new(gateway: G) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store: AnnotationWorkflowStore::new(),
            gateway: Arc::new(gateway),
            tx,
            rx,
            inflight: 0,
        }
    }

    /// The workflow store, for state inspection.
    pub fn store(&self) -> &AnnotationWorkflowStore {
        &self.store
    }

    /// The gateway behind this driver.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether any effect is still executing.
    pub fn has_inflight(&self) -> bool {
        self.inflight > 0
    }

    /// Apply an operator-originated event and launch its effects.
    pub fn dispatch(&mut self, event: WorkflowEvent) {
        let effects = self.store.handle(&event);
        self.spawn_effects(effects);
    }

    /// Wait for the next effect completion, apply it and launch follow-up
    /// effects.
    ///
    /// Returns the applied event so the caller can observe it (e.g. to
    /// configure the viewport when the image arrives), or `None` when
    /// nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<WorkflowEvent> {
        if self.inflight == 0 {
            return None;
        }
        let event = self.rx.recv().await?;
        self.inflight -= 1;
        let effects = self.store.handle(&event);
        self.spawn_effects(effects);
        Some(event)
    }

    /// Pump completions until no effect is in flight.
    pub async fn run_until_idle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    fn spawn_effects(&mut self, effects: Vec<WorkflowEffect>) {
        for effect in effects {
            self.inflight += 1;
            let gateway = Arc::clone(&self.gateway);
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let event = execute_effect(gateway.as_ref(), effect).await;
                // The receiver lives as long as the driver; a send failure
                // just means the driver was dropped mid-flight.
                let _ = tx.send(event);
            });
        }
    }
}

/// Run one effect against the gateway and translate the outcome.
async fn execute_effect<G: NetworkGateway>(gateway: &G, effect: WorkflowEffect) -> WorkflowEvent {
    match effect {
        WorkflowEffect::FetchStudy {
            generation,
            study_id,
        } => match gateway.study(&study_id).await {
            Ok(study) => WorkflowEvent::StudyFetched { study },
            Err(err) => WorkflowEvent::FetchFailed {
                generation,
                error: err.to_string(),
            },
        },
        WorkflowEffect::FetchAnnotation {
            generation,
            study_id,
        } => match gateway.next_annotation(&study_id).await {
            Ok(Some(unit)) => WorkflowEvent::AnnotationFetched { generation, unit },
            Ok(None) => WorkflowEvent::QueueExhausted { generation },
            Err(err) => WorkflowEvent::FetchFailed {
                generation,
                error: err.to_string(),
            },
        },
        WorkflowEffect::FetchImage {
            generation,
            image_id,
        } => fetch_image(gateway, generation, &image_id).await,
        WorkflowEffect::SubmitAnnotation {
            generation,
            annotation_id,
            payload,
        } => match gateway.submit_annotation(&annotation_id, &payload).await {
            Ok(()) => WorkflowEvent::SubmitSucceeded { generation },
            Err(err) => WorkflowEvent::SubmitFailed {
                generation,
                error: err.to_string(),
            },
        },
    }
}

/// Resolve metadata, tile dimensions and segmentation together and validate
/// that they agree before handing the image to the store.
async fn fetch_image<G: NetworkGateway>(
    gateway: &G,
    generation: u64,
    image_id: &str,
) -> WorkflowEvent {
    let (metadata, tiles, segmentation) = tokio::join!(
        gateway.image_metadata(image_id),
        gateway.tile_dimensions(image_id),
        gateway.superpixel_segmentation(image_id),
    );

    let result = metadata.and_then(|metadata| {
        let tiles = tiles?;
        let segmentation = segmentation?;
        if (tiles.size_x, tiles.size_y) != (metadata.size_x, metadata.size_y) {
            return Err(crate::workflow::gateway::GatewayError::malformed(
                "tiles",
                format!(
                    "tile dimensions {}x{} disagree with image metadata {}x{}",
                    tiles.size_x, tiles.size_y, metadata.size_x, metadata.size_y
                ),
            ));
        }
        if (segmentation.width(), segmentation.height()) != (metadata.size_x, metadata.size_y) {
            return Err(crate::workflow::gateway::GatewayError::malformed(
                "superpixels",
                format!(
                    "segmentation raster {}x{} disagrees with image metadata {}x{}",
                    segmentation.width(),
                    segmentation.height(),
                    metadata.size_x,
                    metadata.size_y
                ),
            ));
        }
        Ok((metadata, segmentation))
    });

    match result {
        Ok((metadata, segmentation)) => WorkflowEvent::ImageReady {
            generation,
            metadata,
            segmentation,
        },
        Err(err) => WorkflowEvent::FetchFailed {
            generation,
            error: err.to_string(),
        },
    }
}
