//! Pointer gesture handling for painting.
//!
//! While the primary button is held, pointer-down and pointer-move events
//! paint the region under the pointer with the operator's active fill value;
//! holding shift forces the painted value to `Absent` (erase) regardless of
//! the fill value. In browse mode pointer events belong to the rendering
//! backend (pan/zoom) and are ignored here.

use crate::error::EngineError;
use crate::model::MarkupState;
use crate::layer::SuperpixelLayer;
use crate::render::RenderSurface;
use crate::segmentation::SuperpixelIndex;
use crate::viewport::{InteractionMode, MapViewport, ScreenCoord};

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// A button transitioned to pressed
    Down,
    /// The pointer moved
    Move,
    /// A button transitioned to released
    Up,
}

/// Buttons held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeldButtons {
    pub primary: bool,
    pub secondary: bool,
    pub middle: bool,
}

impl HeldButtons {
    /// No buttons held.
    pub fn none() -> Self {
        Self::default()
    }

    /// Only the primary button held.
    pub fn primary() -> Self {
        Self {
            primary: true,
            ..Self::default()
        }
    }
}

/// Modifier keys held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    /// Only shift held.
    pub fn shift() -> Self {
        Self {
            shift: true,
            ctrl: false,
        }
    }
}

/// One raw pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub position: ScreenCoord,
    pub buttons: HeldButtons,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Primary-button press at `position`.
    pub fn primary_down(position: ScreenCoord, modifiers: Modifiers) -> Self {
        Self {
            phase: PointerPhase::Down,
            position,
            buttons: HeldButtons::primary(),
            modifiers,
        }
    }

    /// Pointer move at `position` with `buttons` held.
    pub fn moved(position: ScreenCoord, buttons: HeldButtons, modifiers: Modifiers) -> Self {
        Self {
            phase: PointerPhase::Move,
            position,
            buttons,
            modifiers,
        }
    }
}

/// A paint performed in response to a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintAction {
    /// Painted region
    pub index: SuperpixelIndex,
    /// Value written
    pub value: MarkupState,
}

/// Translates pointer gestures into paint layer mutations.
#[derive(Debug, Clone)]
pub struct InteractionController {
    fill_value: MarkupState,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    /// Create a controller with the `Definite` fill value selected.
    pub fn new() -> Self {
        Self {
            fill_value: MarkupState::Definite,
        }
    }

    /// The operator-selected fill value.
    pub fn active_fill_value(&self) -> MarkupState {
        self.fill_value
    }

    /// Select the value that painted superpixels are filled with.
    ///
    /// Only `Possible` and `Definite` are accepted; anything else is
    /// rejected and the selection is left unchanged.
    pub fn set_active_fill_value(&mut self, value: MarkupState) -> Result<(), EngineError> {
        if !value.is_fill() {
            return Err(EngineError::invalid_input(format!(
                "{} is not a valid fill value (expected Possible or Definite)",
                value.name()
            )));
        }
        self.fill_value = value;
        Ok(())
    }

    /// Feed a pointer event through the unproject → hit-test → paint
    /// pipeline.
    ///
    /// Returns the paint performed, if any. Events are ignored outside paint
    /// mode, without a held primary button, on release transitions, and when
    /// the pointer is outside the image.
    pub fn handle_pointer<S: RenderSurface>(
        &self,
        event: &PointerEvent,
        viewport: &MapViewport,
        layer: &mut SuperpixelLayer<S>,
    ) -> Result<Option<PaintAction>, EngineError> {
        if viewport.mode() != InteractionMode::Paint || !layer.is_paint_active() {
            return Ok(None);
        }

        let paints = match event.phase {
            PointerPhase::Down | PointerPhase::Move => event.buttons.primary,
            PointerPhase::Up => false,
        };
        if !paints {
            return Ok(None);
        }

        let value = if event.modifiers.shift {
            MarkupState::Absent
        } else {
            self.fill_value
        };

        let pixel = viewport.unproject(event.position);
        let Some(index) = layer.region_at(pixel) else {
            return Ok(None);
        };

        layer.set_value(index, value)?;
        Ok(Some(PaintAction { index, value }))
    }
}
