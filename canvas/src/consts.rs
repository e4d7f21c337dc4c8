//! Shared constants for the canvas crate.

// ── Store ───────────────────────────────────────────────────────

/// Store path the drawing is kept under.
pub const DRAWING_PATH: &str = "points";

// ── Style ───────────────────────────────────────────────────────

/// Stroke color used until the user picks a swatch.
pub const DEFAULT_STROKE_COLOR: &str = "#000";

/// Stroke width used until the user edits the width input.
pub const DEFAULT_STROKE_WIDTH: u32 = 5;

/// Smallest stroke width a committed stroke may carry.
pub const MIN_STROKE_WIDTH: u32 = 1;

// ── Background ──────────────────────────────────────────────────

/// Image drawn beneath every stroke.
pub const BACKGROUND_URL: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/6/66/Cephalometric_radiograph.JPG/600px-Cephalometric_radiograph.JPG";

/// Width and height of the background image, in CSS pixels.
pub const BACKGROUND_SIZE: f64 = 400.0;
