//! Superpixel paint overlay.
//!
//! The layer owns the markup array for the active feature, renders it as a
//! color overlay through a [`RenderSurface`], and resolves pointer positions
//! to region indices through the segmentation raster. While in paint mode a
//! markup array is always bound; painting with nothing bound is a
//! precondition violation, not a no-op.

use std::time::{Duration, Instant};

use crate::constants::{DEFINITE_HUE, OVERLAY_ALPHA, POSSIBLE_HUE};
use crate::error::EngineError;
use crate::model::{MarkupArray, MarkupState};
use crate::render::{OverlayColor, RenderSurface};
use crate::segmentation::{Segmentation, SuperpixelIndex};
use crate::viewport::{InteractionMode, MapViewport, PixelCoord};

/// Redraw scheduling policy.
///
/// Coalescing is purely a performance knob: the rendered overlay always
/// converges to the last committed value once [`SuperpixelLayer::flush_redraw`]
/// runs, regardless of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedrawPolicy {
    /// Redraw on every changing write
    #[default]
    Immediate,
    /// Redraw at most once per window; trailing writes flush later
    Coalesced(Duration),
}

impl RedrawPolicy {
    /// Coalesce redraws into a window of `ms` milliseconds.
    pub fn coalesced_ms(ms: u64) -> Self {
        Self::Coalesced(Duration::from_millis(ms))
    }
}

/// Leading-edge throttle over redraw requests.
#[derive(Debug)]
struct RedrawScheduler {
    policy: RedrawPolicy,
    last_draw: Option<Instant>,
    pending: bool,
}

impl RedrawScheduler {
    fn new(policy: RedrawPolicy) -> Self {
        Self {
            policy,
            last_draw: None,
            pending: false,
        }
    }

    fn reset(&mut self) {
        self.last_draw = None;
        self.pending = false;
    }

    /// Whether a changing write should redraw now; otherwise the draw is
    /// left pending for `take_pending`.
    fn request(&mut self, now: Instant) -> bool {
        match self.policy {
            RedrawPolicy::Immediate => {
                self.last_draw = Some(now);
                true
            }
            RedrawPolicy::Coalesced(window) => {
                let due = self
                    .last_draw
                    .is_none_or(|last| now.duration_since(last) >= window);
                if due {
                    self.last_draw = Some(now);
                    self.pending = false;
                } else {
                    self.pending = true;
                }
                due
            }
        }
    }

    fn take_pending(&mut self, now: Instant) -> bool {
        if self.pending {
            self.pending = false;
            self.last_draw = Some(now);
            true
        } else {
            false
        }
    }
}

/// Display mode of the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerMode {
    /// No markup bound; overlay hidden
    #[default]
    Hidden,
    /// Markup shown read-only; no pointer-driven mutation
    Display,
    /// Markup bound for painting
    Paint,
}

/// Color overlay over one image's superpixel regions.
pub struct SuperpixelLayer<S> {
    segmentation: Segmentation,
    surface: S,
    mode: LayerMode,
    markup: Option<MarkupArray>,
    scheduler: RedrawScheduler,
}

impl<S: RenderSurface> SuperpixelLayer<S> {
    /// Create a hidden layer over `segmentation`, rendering to `surface`.
    pub fn new(segmentation: Segmentation, surface: S, policy: RedrawPolicy) -> Self {
        Self {
            segmentation,
            surface,
            mode: LayerMode::Hidden,
            markup: None,
            scheduler: RedrawScheduler::new(policy),
        }
    }

    /// Current layer mode.
    pub fn mode(&self) -> LayerMode {
        self.mode
    }

    /// Whether the layer is bound for painting.
    pub fn is_paint_active(&self) -> bool {
        self.mode == LayerMode::Paint
    }

    /// The segmentation backing this layer.
    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    /// The rendering surface, for inspection.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Overlay color for a markup state.
    ///
    /// Values outside the enumeration never reach this mapping: raw floats
    /// are rejected at [`MarkupState::from_value`].
    pub fn color_mapping(value: MarkupState) -> OverlayColor {
        match value {
            MarkupState::Absent => OverlayColor::TRANSPARENT,
            MarkupState::Possible => OverlayColor::from_rgb_hex(POSSIBLE_HUE, OVERLAY_ALPHA),
            MarkupState::Definite => OverlayColor::from_rgb_hex(DEFINITE_HUE, OVERLAY_ALPHA),
        }
    }

    /// Enter paint mode.
    ///
    /// With `None`, a fresh markup array of the segmentation's region count
    /// is allocated, all `Absent`. A provided array whose length mismatches
    /// the region count aborts the paint session with an error; the layer
    /// stays hidden. After a successful activation a markup array is bound
    /// for the whole paint mode.
    pub fn activate(
        &mut self,
        initial: Option<MarkupArray>,
        viewport: &mut MapViewport,
    ) -> Result<(), EngineError> {
        self.clear(viewport);

        let region_count = self.segmentation.region_count();
        let markup = match initial {
            Some(values) => {
                if values.len() != region_count {
                    return Err(EngineError::invalid_input(format!(
                        "markup array length {} does not match region count {region_count}",
                        values.len()
                    )));
                }
                values
            }
            None => MarkupArray::absent(region_count),
        };

        let bindings = viewport.set_interaction_mode(InteractionMode::Paint);
        self.surface.set_pointer_bindings(bindings);

        self.markup = Some(markup);
        self.mode = LayerMode::Paint;
        self.redraw();
        self.surface.set_overlay_visible(true);
        log::debug!("paint layer active over {region_count} regions");
        Ok(())
    }

    /// Enter view-only mode showing `values`; pointer-driven mutation is
    /// not possible.
    pub fn display(
        &mut self,
        values: MarkupArray,
        viewport: &mut MapViewport,
    ) -> Result<(), EngineError> {
        self.clear(viewport);

        let region_count = self.segmentation.region_count();
        if values.len() != region_count {
            return Err(EngineError::invalid_input(format!(
                "markup array length {} does not match region count {region_count}",
                values.len()
            )));
        }

        self.markup = Some(values);
        self.mode = LayerMode::Display;
        self.redraw();
        self.surface.set_overlay_visible(true);
        Ok(())
    }

    /// Unbind the markup, hide the overlay and restore browse bindings.
    pub fn clear(&mut self, viewport: &mut MapViewport) {
        self.markup = None;
        self.mode = LayerMode::Hidden;
        self.scheduler.reset();
        self.surface.draw_overlay(&[]);
        self.surface.set_overlay_visible(false);
        let bindings = viewport.set_interaction_mode(InteractionMode::Browse);
        self.surface.set_pointer_bindings(bindings);
    }

    /// Write `value` into region `index`.
    ///
    /// Idempotent by value: a write that does not change the stored value
    /// performs no redraw. A changing write updates storage and schedules a
    /// redraw under the layer's [`RedrawPolicy`].
    pub fn set_value(
        &mut self,
        index: SuperpixelIndex,
        value: MarkupState,
    ) -> Result<(), EngineError> {
        if self.mode != LayerMode::Paint {
            return Err(EngineError::NoActiveMarkup);
        }
        let markup = self.markup.as_mut().ok_or(EngineError::NoActiveMarkup)?;

        if markup.set(index, value)? {
            log::trace!("paint region {index} -> {}", value.name());
            if self.scheduler.request(Instant::now()) {
                self.redraw();
            }
        }
        Ok(())
    }

    /// Redraw if a coalesced write is still pending.
    ///
    /// Call this from the event loop tick; it guarantees convergence to the
    /// last committed value under any redraw policy.
    pub fn flush_redraw(&mut self) {
        if self.scheduler.take_pending(Instant::now()) {
            self.redraw();
        }
    }

    /// The operator-drawn markup array, while in paint mode.
    pub fn active_values(&self) -> Option<&MarkupArray> {
        match self.mode {
            LayerMode::Paint => self.markup.as_ref(),
            _ => None,
        }
    }

    /// Region index under an image pixel coordinate.
    pub fn region_at(&self, pixel: PixelCoord) -> Option<SuperpixelIndex> {
        self.segmentation.label_at(pixel)
    }

    fn redraw(&mut self) {
        let colors: Vec<OverlayColor> = match &self.markup {
            Some(markup) => markup.iter().map(Self::color_mapping).collect(),
            None => Vec::new(),
        };
        self.surface.draw_overlay(&colors);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::render::RecordingSurface;
    use crate::viewport::ContainerSize;

    fn test_segmentation(regions_per_side: usize) -> Segmentation {
        let n = regions_per_side;
        let labels = Array2::from_shape_fn((n, n), |(y, x)| (y * n + x) as u32);
        Segmentation::new(labels).unwrap()
    }

    fn test_viewport(side: u32) -> MapViewport {
        MapViewport::new(side, side, ContainerSize::new(side as f64, side as f64)).unwrap()
    }

    fn test_layer(regions_per_side: usize, policy: RedrawPolicy) -> SuperpixelLayer<RecordingSurface> {
        SuperpixelLayer::new(
            test_segmentation(regions_per_side),
            RecordingSurface::new(),
            policy,
        )
    }

    #[test]
    fn test_activate_fills_absent() {
        let mut viewport = test_viewport(10);
        let mut layer = test_layer(10, RedrawPolicy::Immediate);

        layer.activate(None, &mut viewport).unwrap();

        let values = layer.active_values().unwrap();
        assert_eq!(values.len(), 100);
        assert!(values.is_blank());
        assert!(layer.surface().visible());
        assert_eq!(layer.surface().overlay().len(), 100);
    }

    #[test]
    fn test_activate_rejects_wrong_length() {
        let mut viewport = test_viewport(10);
        let mut layer = test_layer(10, RedrawPolicy::Immediate);

        let result = layer.activate(Some(MarkupArray::absent(50)), &mut viewport);
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
        assert_eq!(layer.mode(), LayerMode::Hidden);
        assert!(layer.active_values().is_none());
    }

    #[test]
    fn test_paint_without_activation_is_error() {
        let mut layer = test_layer(10, RedrawPolicy::Immediate);
        let result = layer.set_value(0, MarkupState::Definite);
        assert!(matches!(result, Err(EngineError::NoActiveMarkup)));
    }

    #[test]
    fn test_display_mode_blocks_painting() {
        let mut viewport = test_viewport(10);
        let mut layer = test_layer(10, RedrawPolicy::Immediate);

        layer
            .display(MarkupArray::absent(100), &mut viewport)
            .unwrap();
        assert_eq!(layer.mode(), LayerMode::Display);

        let result = layer.set_value(0, MarkupState::Definite);
        assert!(matches!(result, Err(EngineError::NoActiveMarkup)));
    }

    #[test]
    fn test_identical_write_redraws_once() {
        let mut viewport = test_viewport(10);
        let mut layer = test_layer(10, RedrawPolicy::Immediate);
        layer.activate(None, &mut viewport).unwrap();

        let baseline = layer.surface().redraws();
        layer.set_value(5, MarkupState::Definite).unwrap();
        layer.set_value(5, MarkupState::Definite).unwrap();
        assert_eq!(layer.surface().redraws(), baseline + 1);
    }

    #[test]
    fn test_rendered_color_is_last_written_value() {
        let mut viewport = test_viewport(10);
        let mut layer = test_layer(10, RedrawPolicy::Immediate);
        layer.activate(None, &mut viewport).unwrap();

        layer.set_value(5, MarkupState::Possible).unwrap();
        layer.set_value(5, MarkupState::Definite).unwrap();
        layer.set_value(6, MarkupState::Possible).unwrap();

        let surface = layer.surface();
        assert_eq!(
            surface.color_at(5),
            Some(SuperpixelLayer::<RecordingSurface>::color_mapping(
                MarkupState::Definite
            ))
        );
        assert_eq!(
            surface.color_at(6),
            Some(SuperpixelLayer::<RecordingSurface>::color_mapping(
                MarkupState::Possible
            ))
        );
        assert_eq!(surface.color_at(7), Some(OverlayColor::TRANSPARENT));
    }

    #[test]
    fn test_color_mapping() {
        type Layer = SuperpixelLayer<RecordingSurface>;
        assert_eq!(
            Layer::color_mapping(MarkupState::Absent),
            OverlayColor::TRANSPARENT
        );
        let possible = Layer::color_mapping(MarkupState::Possible);
        let definite = Layer::color_mapping(MarkupState::Definite);
        assert_eq!(possible.a, 0.4);
        assert_eq!(definite.a, 0.4);
        assert_ne!(possible, definite);
    }

    #[test]
    fn test_coalesced_redraw_converges_after_flush() {
        let mut viewport = test_viewport(10);
        // Window far larger than test runtime so the second write coalesces.
        let mut layer = test_layer(10, RedrawPolicy::coalesced_ms(60_000));
        layer.activate(None, &mut viewport).unwrap();

        let baseline = layer.surface().redraws();
        layer.set_value(0, MarkupState::Definite).unwrap();
        assert_eq!(layer.surface().redraws(), baseline + 1);

        layer.set_value(1, MarkupState::Definite).unwrap();
        layer.set_value(1, MarkupState::Possible).unwrap();
        assert_eq!(layer.surface().redraws(), baseline + 1);
        assert_eq!(layer.surface().color_at(1), Some(OverlayColor::TRANSPARENT));

        layer.flush_redraw();
        assert_eq!(layer.surface().redraws(), baseline + 2);
        assert_eq!(
            layer.surface().color_at(1),
            Some(SuperpixelLayer::<RecordingSurface>::color_mapping(
                MarkupState::Possible
            ))
        );

        // Nothing pending: flushing again is a no-op.
        layer.flush_redraw();
        assert_eq!(layer.surface().redraws(), baseline + 2);
    }

    #[test]
    fn test_clear_hides_and_restores_browse() {
        let mut viewport = test_viewport(10);
        let mut layer = test_layer(10, RedrawPolicy::Immediate);
        layer.activate(None, &mut viewport).unwrap();
        assert_eq!(viewport.mode(), InteractionMode::Paint);

        layer.clear(&mut viewport);
        assert!(!layer.surface().visible());
        assert_eq!(layer.mode(), LayerMode::Hidden);
        assert_eq!(viewport.mode(), InteractionMode::Browse);
        assert_eq!(
            layer.surface().bindings().map(|b| b.pan),
            Some(crate::viewport::PointerButton::Primary)
        );
    }
}
