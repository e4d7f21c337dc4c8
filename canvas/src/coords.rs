//! Coordinate mapping from raw pointer/touch input to surface-relative points.

#[cfg(test)]
#[path = "coords_test.rs"]
mod coords_test;

use serde::{Deserialize, Serialize};

/// A point relative to the drawing surface's top-left corner.
///
/// Coordinates are not clamped: a pointer dragged outside the surface yields
/// negative or oversized values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Bounding rectangle of the drawing surface in client (viewport) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }
}

/// A pointer or touch event reduced to the client coordinates it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    /// Mouse or pen event at a single client position.
    Mouse { client_x: f64, client_y: f64 },
    /// Touch event with its active touches, in the order the browser reports them.
    Touch { touches: Vec<Point> },
}

impl PointerInput {
    #[must_use]
    pub fn mouse(client_x: f64, client_y: f64) -> Self {
        Self::Mouse { client_x, client_y }
    }

    #[must_use]
    pub fn touch(touches: Vec<Point>) -> Self {
        Self::Touch { touches }
    }

    /// Client coordinates that drive the stroke: the pointer position, or the first active touch.
    #[must_use]
    pub fn client_point(&self) -> Option<Point> {
        match self {
            Self::Mouse { client_x, client_y } => Some(Point::new(*client_x, *client_y)),
            Self::Touch { touches } => touches.first().copied(),
        }
    }
}

/// Map an input event to a point relative to `bounds`.
///
/// Returns `None` for a touch event without active touches.
#[must_use]
pub fn map(input: &PointerInput, bounds: &BoundingBox) -> Option<Point> {
    let client = input.client_point()?;
    Some(Point::new(client.x - bounds.left, client.y - bounds.top))
}
