//! Annotation workflow: state machine, network gateway and async driver.

mod driver;
mod gateway;
mod http;
mod store;

#[cfg(test)]
mod tests;

pub use driver::WorkflowDriver;
pub use gateway::{GatewayError, ImageMetadata, NetworkGateway, TileDimensions};
pub use http::HttpGateway;
pub use store::{AnnotationWorkflowStore, WorkflowEffect, WorkflowEvent};
