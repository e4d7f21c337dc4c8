//! Input model: color swatches, the active stroke style, and the gesture state.
//!
//! `Style` captures what the next stroke will look like. `InputState` is the
//! two-state machine driven by pointer events: `Idle` until a pointer goes
//! down, `Drawing` until it comes back up. Transitions themselves live in
//! [`crate::engine::EngineCore`], which owns both.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::consts::{DEFAULT_STROKE_WIDTH, MIN_STROKE_WIDTH};
use crate::doc::Color;

/// The fixed color swatches offered next to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Swatch {
    #[default]
    Black,
    Red,
    Blue,
}

impl Swatch {
    /// Every swatch in display order.
    pub const ALL: [Swatch; 3] = [Swatch::Black, Swatch::Red, Swatch::Blue];

    /// CSS color value for this swatch.
    #[must_use]
    pub fn css(self) -> &'static str {
        match self {
            Self::Black => "#000",
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }

    #[must_use]
    pub fn color(self) -> Color {
        Color::new(self.css())
    }

    /// Find the swatch with the given CSS value or name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "#000" | "#000000" | "black" => Some(Self::Black),
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }
}

/// Style applied to the next stroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    pub color: Color,
    pub width: u32,
}

impl Default for Style {
    fn default() -> Self {
        Self { color: Color::default(), width: DEFAULT_STROKE_WIDTH }
    }
}

impl Style {
    /// Set the width. Returns false (and keeps the current width) below the minimum.
    pub fn set_width(&mut self, width: u32) -> bool {
        if width < MIN_STROKE_WIDTH {
            return false;
        }
        self.width = width;
        true
    }

    /// Set the width from the numeric input's text.
    ///
    /// Leading digits are honored the way a number field reports them
    /// (`"12px"` → 12). Text without a leading integer, or a width below the
    /// minimum, keeps the current width and returns false.
    pub fn set_width_text(&mut self, raw: &str) -> bool {
        match parse_width(raw) {
            Some(width) => self.set_width(width),
            None => false,
        }
    }
}

/// Parse the leading unsigned integer of `raw`, ignoring surrounding whitespace.
#[must_use]
pub fn parse_width(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);
    match digits[..end].parse::<u32>() {
        Ok(width) => Some(width),
        Err(_) => None,
    }
}

/// Gesture state between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    /// No stroke in progress; pointer moves are ignored.
    #[default]
    Idle,
    /// A stroke is in progress; pointer moves append to the last stroke.
    Drawing,
}

impl InputState {
    #[must_use]
    pub fn is_drawing(self) -> bool {
        matches!(self, Self::Drawing)
    }
}
