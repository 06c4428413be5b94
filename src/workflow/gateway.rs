//! Network gateway contract.
//!
//! The workflow store never performs I/O itself; all fetch/submit traffic
//! goes through this trait so transports can be swapped (HTTP in
//! production, in-memory for tests and the demo).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::model::{AnnotationUnit, Study, SubmissionPayload};
use crate::segmentation::Segmentation;

/// Image metadata needed to configure the viewport.
///
/// The dimensions are mandatory: a response without them is malformed and
/// fails deserialization loudly instead of defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Image width in pixels
    pub size_x: u32,
    /// Image height in pixels
    pub size_y: u32,
}

/// Tile dimensions of an image, from the tile server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDimensions {
    /// Tiled width in pixels
    pub size_x: u32,
    /// Tiled height in pixels
    pub size_y: u32,
}

/// Errors from a gateway transport.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP transport failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with an unexpected status code
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Endpoint that answered
        endpoint: String,
    },

    /// Response body did not match the expected shape
    #[error("malformed response from {endpoint}: {message}")]
    Malformed {
        /// Endpoint that answered
        endpoint: String,
        /// What was wrong with the body
        message: String,
    },

    /// Superpixel raster could not be decoded
    #[error("failed to decode superpixel raster: {0}")]
    RasterDecode(#[from] image::ImageError),
}

impl GatewayError {
    /// Create a malformed-response error.
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Malformed { .. } | GatewayError::RasterDecode(_) => {
                EngineError::protocol(err.to_string())
            }
            GatewayError::Transport(_) | GatewayError::Status { .. } => {
                EngineError::network(err.to_string())
            }
        }
    }
}

/// Fetch/submit operations of the annotation server.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    /// Request the next pending annotation unit of a study.
    ///
    /// `Ok(None)` means the queue is exhausted (the server's explicit
    /// no-content signal), which is distinct from any error.
    async fn next_annotation(
        &self,
        study_id: &str,
    ) -> Result<Option<AnnotationUnit>, GatewayError>;

    /// Fetch study metadata (questions and features).
    async fn study(&self, study_id: &str) -> Result<Study, GatewayError>;

    /// Fetch image metadata.
    async fn image_metadata(&self, image_id: &str) -> Result<ImageMetadata, GatewayError>;

    /// Fetch the tiled dimensions of an image.
    async fn tile_dimensions(&self, image_id: &str) -> Result<TileDimensions, GatewayError>;

    /// Fetch and decode the superpixel segmentation raster of an image.
    async fn superpixel_segmentation(
        &self,
        image_id: &str,
    ) -> Result<Segmentation, GatewayError>;

    /// Submit a completed annotation.
    async fn submit_annotation(
        &self,
        annotation_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<(), GatewayError>;
}
