//! SPAT - SuperPixel Annotation Tool
//!
//! An interactive superpixel annotation engine: a pixel-indexed paint
//! overlay on a pan/zoom image viewport, coupled to a finite-state workflow
//! that drives an operator through fetch → annotate → submit → next over a
//! study's image queue. Rendering is abstracted behind the narrow
//! [`render::RenderSurface`] capability, so the engine itself stays free of
//! any particular rendering library.

pub mod config;
pub mod constants;
pub mod error;
pub mod interaction;
pub mod layer;
pub mod model;
pub mod render;
pub mod segmentation;
pub mod synthetic;
pub mod viewport;
pub mod workflow;

pub use error::EngineError;
pub use interaction::{InteractionController, PaintAction, PointerEvent};
pub use layer::{RedrawPolicy, SuperpixelLayer};
pub use model::{MarkupArray, MarkupState, SubmissionState};
pub use render::{RecordingSurface, RenderSurface};
pub use segmentation::{Segmentation, SuperpixelIndex};
pub use viewport::{ContainerSize, InteractionMode, MapViewport};
pub use workflow::{
    AnnotationWorkflowStore, HttpGateway, NetworkGateway, WorkflowDriver, WorkflowEvent,
};
