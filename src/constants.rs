//! Global constants for the SPAT engine.

/// Maximum zoom level (log2 scale steps above 1:1 pixel mapping).
pub const MAX_ZOOM: f64 = 2.0;

/// Zoom step applied by discrete zoom-in/zoom-out commands.
pub const ZOOM_STEP: f64 = 0.5;

/// Overlay alpha for visible markup states.
pub const OVERLAY_ALPHA: f32 = 0.4;

/// Warning hue for the `Possible` markup state.
pub const POSSIBLE_HUE: u32 = 0xfafa00;

/// Affirmative hue for the `Definite` markup state.
pub const DEFINITE_HUE: u32 = 0x0000ff;

/// Default redraw coalescing window, in milliseconds.
///
/// Coalescing is a performance knob only; correctness never depends on it.
pub const DEFAULT_REDRAW_COALESCE_MS: u64 = 100;

/// Default API base URL for the HTTP gateway.
pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api/v1/";
