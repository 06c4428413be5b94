//! Pan/zoom viewport and pixel ↔ screen projection.
//!
//! This module contains the mathematical core of the image viewport,
//! extracted for testability: zoom clamping, pan clamping, cursor-anchored
//! zoom, and the projection used for pointer hit-testing.
//!
//! Zoom is expressed in log2 levels: at zoom `z` one image pixel covers
//! `2^z` screen pixels. `min_zoom` is derived from the container/image ratio
//! so the whole image fits on screen at the bottom of the range.

use crate::constants::MAX_ZOOM;
use crate::error::EngineError;

/// Size of the on-screen container hosting the viewport, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    /// Create a new container size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A point in image pixel coordinates; (0, 0) is the image's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCoord {
    pub x: f64,
    pub y: f64,
}

impl PixelCoord {
    /// Create a new pixel coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in screen coordinates; (0, 0) is the container's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenCoord {
    pub x: f64,
    pub y: f64,
}

impl ScreenCoord {
    /// Create a new screen coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    /// Whether `other` lies entirely within these bounds.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }
}

/// Physical pointer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Left / primary button
    Primary,
    /// Right / secondary button
    Secondary,
    /// Middle button
    Middle,
}

/// Which pointer buttons drive pan and click-zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerBindings {
    /// Button that drags the view
    pub pan: PointerButton,
    /// Button that click-zooms
    pub click_zoom: PointerButton,
}

/// Viewport interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    /// Primary button pans, secondary click-zooms
    #[default]
    Browse,
    /// Primary button paints; pan moves to secondary, click-zoom to middle
    Paint,
}

impl InteractionMode {
    /// Pointer bindings for this mode.
    pub fn bindings(self) -> PointerBindings {
        match self {
            InteractionMode::Browse => PointerBindings {
                pan: PointerButton::Primary,
                click_zoom: PointerButton::Secondary,
            },
            InteractionMode::Paint => PointerBindings {
                pan: PointerButton::Secondary,
                click_zoom: PointerButton::Middle,
            },
        }
    }
}

/// Snapshot of the viewport's pan/zoom state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Current zoom level
    pub zoom: f64,
    /// Image point at the container center
    pub center: PixelCoord,
    /// Maximum bounds, i.e. the full image rectangle
    pub bounds: Bounds,
}

/// Pan/zoom/projection state for one image.
#[derive(Debug, Clone)]
pub struct MapViewport {
    image_w: f64,
    image_h: f64,
    container: ContainerSize,
    zoom: f64,
    center: PixelCoord,
    min_zoom: f64,
    mode: InteractionMode,
}

impl MapViewport {
    /// Create a viewport for an image of `image_w` x `image_h` pixels shown
    /// in `container`.
    ///
    /// The initial view is the whole image: zoom starts at `min_zoom` with
    /// the center at the image midpoint. Fails if the container or the image
    /// has zero area.
    pub fn new(
        image_w: u32,
        image_h: u32,
        container: ContainerSize,
    ) -> Result<Self, EngineError> {
        if container.width <= 0.0 || container.height <= 0.0 {
            return Err(EngineError::configuration(format!(
                "container has zero area ({} x {})",
                container.width, container.height
            )));
        }
        if image_w == 0 || image_h == 0 {
            return Err(EngineError::configuration(format!(
                "image has zero area ({image_w} x {image_h})"
            )));
        }

        let image_w = f64::from(image_w);
        let image_h = f64::from(image_h);
        let fit_ratio = (container.width / image_w).min(container.height / image_h);
        let min_zoom = fit_ratio.log2().floor().min(0.0);

        Ok(Self {
            image_w,
            image_h,
            container,
            zoom: min_zoom,
            center: PixelCoord::new(image_w / 2.0, image_h / 2.0),
            min_zoom,
            mode: InteractionMode::Browse,
        })
    }

    /// Current zoom level.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Lowest permitted zoom level; the full image is visible here.
    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    /// Highest permitted zoom level.
    pub fn max_zoom(&self) -> f64 {
        MAX_ZOOM
    }

    /// Image point currently at the container center.
    pub fn center(&self) -> PixelCoord {
        self.center
    }

    /// Current interaction mode.
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ViewportState {
        ViewportState {
            zoom: self.zoom,
            center: self.center,
            bounds: self.image_bounds(),
        }
    }

    /// The full image rectangle.
    pub fn image_bounds(&self) -> Bounds {
        Bounds {
            left: 0.0,
            top: 0.0,
            right: self.image_w,
            bottom: self.image_h,
        }
    }

    /// Image-space rectangle currently covered by the container.
    pub fn visible_bounds(&self) -> Bounds {
        let half_w = self.container.width / (2.0 * self.scale());
        let half_h = self.container.height / (2.0 * self.scale());
        Bounds {
            left: self.center.x - half_w,
            top: self.center.y - half_h,
            right: self.center.x + half_w,
            bottom: self.center.y + half_h,
        }
    }

    /// Switch interaction mode and return the pointer bindings to apply.
    ///
    /// In `Paint` mode the primary button is freed for painting; pan and
    /// click-zoom move to the secondary and middle buttons.
    pub fn set_interaction_mode(&mut self, mode: InteractionMode) -> PointerBindings {
        if self.mode != mode {
            log::debug!("viewport interaction mode -> {mode:?}");
        }
        self.mode = mode;
        mode.bindings()
    }

    /// Pointer bindings for the current mode.
    pub fn pointer_bindings(&self) -> PointerBindings {
        self.mode.bindings()
    }

    /// Project an image pixel coordinate to screen coordinates.
    pub fn project(&self, pixel: PixelCoord) -> ScreenCoord {
        let scale = self.scale();
        ScreenCoord::new(
            (pixel.x - self.center.x) * scale + self.container.width / 2.0,
            (pixel.y - self.center.y) * scale + self.container.height / 2.0,
        )
    }

    /// Project a screen coordinate back to image pixel coordinates.
    ///
    /// Exact inverse of [`project`](Self::project); pointer hit-testing for
    /// painting depends on sub-pixel accuracy at maximum zoom.
    pub fn unproject(&self, screen: ScreenCoord) -> PixelCoord {
        let scale = self.scale();
        PixelCoord::new(
            (screen.x - self.container.width / 2.0) / scale + self.center.x,
            (screen.y - self.container.height / 2.0) / scale + self.center.y,
        )
    }

    /// Set the zoom level, clamped to `[min_zoom, max_zoom]`.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, MAX_ZOOM);
        self.clamp_center();
    }

    /// Adjust the zoom level by a delta of levels.
    pub fn zoom_by(&mut self, delta_levels: f64) {
        self.set_zoom(self.zoom + delta_levels);
    }

    /// Zoom to `new_zoom` keeping the image point under `anchor` fixed.
    pub fn zoom_to_point(&mut self, new_zoom: f64, anchor: ScreenCoord) {
        let fixed = self.unproject(anchor);
        self.zoom = new_zoom.clamp(self.min_zoom, MAX_ZOOM);
        let scale = self.scale();
        self.center = PixelCoord::new(
            fixed.x - (anchor.x - self.container.width / 2.0) / scale,
            fixed.y - (anchor.y - self.container.height / 2.0) / scale,
        );
        self.clamp_center();
    }

    /// Pan by a screen-space delta (content follows the pointer).
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let scale = self.scale();
        self.center = PixelCoord::new(self.center.x - dx / scale, self.center.y - dy / scale);
        self.clamp_center();
    }

    fn scale(&self) -> f64 {
        self.zoom.exp2()
    }

    /// Clamp the center so the image never leaves the viewable frame.
    ///
    /// When the image is larger than the view the visible window stays
    /// inside the image; when smaller, the image is pinned at the center.
    fn clamp_center(&mut self) {
        let half_w = self.container.width / (2.0 * self.scale());
        let half_h = self.container.height / (2.0 * self.scale());

        self.center.x = if 2.0 * half_w >= self.image_w {
            self.image_w / 2.0
        } else {
            self.center.x.clamp(half_w, self.image_w - half_w)
        };
        self.center.y = if 2.0 * half_h >= self.image_h {
            self.image_h / 2.0
        } else {
            self.center.y.clamp(half_h, self.image_h - half_h)
        };
    }
}
