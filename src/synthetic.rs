//! Synthetic fixtures: generated segmentations and an in-memory gateway.
//!
//! Lets the engine run a full fetch → annotate → submit cycle without a
//! server, for tests and the headless demo binary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array2;

use crate::model::{AnnotationUnit, Study, SubmissionPayload};
use crate::segmentation::Segmentation;
use crate::workflow::{GatewayError, ImageMetadata, NetworkGateway, TileDimensions};

/// Generate a grid segmentation: square superpixels of `cell` pixels,
/// labelled row-major.
pub fn grid_segmentation(width: u32, height: u32, cell: u32) -> Segmentation {
    let cols = width.div_ceil(cell) as usize;
    let labels = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        ((y as u32 / cell) as usize * cols + (x as u32 / cell) as usize) as u32
    });
    Segmentation::new(labels).expect("grid raster is never empty")
}

/// A synthetic image served by the in-memory gateway.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticImage {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Superpixel cell side length
    pub cell: u32,
}

impl SyntheticImage {
    /// Create a synthetic image description.
    pub fn new(width: u32, height: u32, cell: u32) -> Self {
        Self {
            width,
            height,
            cell,
        }
    }

    /// Number of superpixel regions in the grid.
    pub fn region_count(&self) -> usize {
        (self.width.div_ceil(self.cell) * self.height.div_ceil(self.cell)) as usize
    }
}

/// In-memory [`NetworkGateway`] over a scripted queue of annotation units.
pub struct InMemoryGateway {
    study: Study,
    queue: Mutex<VecDeque<AnnotationUnit>>,
    images: Mutex<HashMap<String, SyntheticImage>>,
    image_delays: Mutex<HashMap<String, Duration>>,
    submissions: Mutex<Vec<(String, SubmissionPayload)>>,
    fail_next_submit: AtomicBool,
}

impl InMemoryGateway {
    /// Create a gateway serving `study` with an empty queue.
    pub fn new(study: Study) -> Self {
        Self {
            study,
            queue: Mutex::new(VecDeque::new()),
            images: Mutex::new(HashMap::new()),
            image_delays: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            fail_next_submit: AtomicBool::new(false),
        }
    }

    /// Append a pending unit and register its image.
    pub fn push_unit(&self, unit: AnnotationUnit, image: SyntheticImage) {
        self.images
            .lock()
            .unwrap()
            .insert(unit.image_id.clone(), image);
        self.queue.lock().unwrap().push_back(unit);
    }

    /// Delay every image-related fetch for `image_id` by `delay`.
    pub fn delay_image(&self, image_id: &str, delay: Duration) {
        self.image_delays
            .lock()
            .unwrap()
            .insert(image_id.to_string(), delay);
    }

    /// Make the next submission fail with a server error.
    pub fn fail_next_submit(&self) {
        self.fail_next_submit.store(true, Ordering::SeqCst);
    }

    /// Accepted submissions so far, in order.
    pub fn submissions(&self) -> Vec<(String, SubmissionPayload)> {
        self.submissions.lock().unwrap().clone()
    }

    fn image(&self, image_id: &str) -> Result<SyntheticImage, GatewayError> {
        self.images
            .lock()
            .unwrap()
            .get(image_id)
            .copied()
            .ok_or(GatewayError::Status {
                status: 404,
                endpoint: format!("image/{image_id}"),
            })
    }

    async fn apply_delay(&self, image_id: &str) {
        let delay = self.image_delays.lock().unwrap().get(image_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl NetworkGateway for InMemoryGateway {
    async fn next_annotation(
        &self,
        _study_id: &str,
    ) -> Result<Option<AnnotationUnit>, GatewayError> {
        Ok(self.queue.lock().unwrap().pop_front())
    }

    async fn study(&self, _study_id: &str) -> Result<Study, GatewayError> {
        Ok(self.study.clone())
    }

    async fn image_metadata(&self, image_id: &str) -> Result<ImageMetadata, GatewayError> {
        self.apply_delay(image_id).await;
        let image = self.image(image_id)?;
        Ok(ImageMetadata {
            size_x: image.width,
            size_y: image.height,
        })
    }

    async fn tile_dimensions(&self, image_id: &str) -> Result<TileDimensions, GatewayError> {
        self.apply_delay(image_id).await;
        let image = self.image(image_id)?;
        Ok(TileDimensions {
            size_x: image.width,
            size_y: image.height,
        })
    }

    async fn superpixel_segmentation(
        &self,
        image_id: &str,
    ) -> Result<Segmentation, GatewayError> {
        self.apply_delay(image_id).await;
        let image = self.image(image_id)?;
        Ok(grid_segmentation(image.width, image.height, image.cell))
    }

    async fn submit_annotation(
        &self,
        annotation_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<(), GatewayError> {
        if self.fail_next_submit.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 500,
                endpoint: format!("annotation/{annotation_id}"),
            });
        }
        self.submissions
            .lock()
            .unwrap()
            .push((annotation_id.to_string(), payload.clone()));
        Ok(())
    }
}
