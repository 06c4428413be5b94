//! HTTP implementation of the network gateway.
//!
//! Routes follow the annotation server's REST layout under a common
//! `/api/v1/` base:
//!
//! - `GET task/me/annotation/next?studyId=…` — next pending unit (404 means
//!   the queue is exhausted)
//! - `GET study/{id}` — study metadata
//! - `GET image/{id}` — image metadata with pixel dimensions
//! - `GET item/{id}/tiles` — tiled dimensions
//! - `GET image/{id}/superpixels` — RGB-encoded superpixel raster (PNG)
//! - `POST annotation/{id}` — submit a completed annotation

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::EngineError;
use crate::model::{AnnotationUnit, Study, SubmissionPayload};
use crate::segmentation::Segmentation;
use crate::workflow::gateway::{
    GatewayError, ImageMetadata, NetworkGateway, TileDimensions,
};

/// Gateway talking to an annotation server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base: Url,
}

impl HttpGateway {
    /// Create a gateway against `base`, which must end with a slash
    /// (e.g. `http://host/api/v1/`) so endpoint paths join under it.
    pub fn new(base: Url) -> Self {
        Self {
            client: Client::new(),
            base,
        }
    }

    /// Create a gateway from a base URL string.
    pub fn from_base_url(base: &str) -> Result<Self, EngineError> {
        let base = Url::parse(base)
            .map_err(|err| EngineError::configuration(format!("invalid API base {base}: {err}")))?;
        Ok(Self::new(base))
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|err| GatewayError::malformed(path, err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        let endpoint = url.path().to_string();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|err| GatewayError::malformed(endpoint, err.to_string()))
    }
}

#[async_trait]
impl NetworkGateway for HttpGateway {
    async fn next_annotation(
        &self,
        study_id: &str,
    ) -> Result<Option<AnnotationUnit>, GatewayError> {
        let mut url = self.endpoint("task/me/annotation/next")?;
        url.query_pairs_mut().append_pair("studyId", study_id);

        let endpoint = url.path().to_string();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // The server's explicit no-content signal: the queue is empty.
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| GatewayError::malformed(endpoint, err.to_string()))
    }

    async fn study(&self, study_id: &str) -> Result<Study, GatewayError> {
        let url = self.endpoint(&format!("study/{study_id}"))?;
        self.get_json(url).await
    }

    async fn image_metadata(&self, image_id: &str) -> Result<ImageMetadata, GatewayError> {
        let url = self.endpoint(&format!("image/{image_id}"))?;
        self.get_json(url).await
    }

    async fn tile_dimensions(&self, image_id: &str) -> Result<TileDimensions, GatewayError> {
        let url = self.endpoint(&format!("item/{image_id}/tiles"))?;
        self.get_json(url).await
    }

    async fn superpixel_segmentation(
        &self,
        image_id: &str,
    ) -> Result<Segmentation, GatewayError> {
        let url = self.endpoint(&format!("image/{image_id}/superpixels"))?;
        let endpoint = url.path().to_string();

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }
        let body = response.bytes().await?;
        let raster = image::load_from_memory(&body)?.to_rgb8();
        Segmentation::from_rgb_image(&raster)
            .map_err(|err| GatewayError::malformed(endpoint, err.to_string()))
    }

    async fn submit_annotation(
        &self,
        annotation_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("annotation/{annotation_id}"))?;
        let endpoint = url.path().to_string();

        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_join_under_base() {
        let gateway = HttpGateway::from_base_url("http://localhost:8080/api/v1/").unwrap();
        let url = gateway.endpoint("image/abc/superpixels").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/image/abc/superpixels"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpGateway::from_base_url("not a url");
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
    }
}
