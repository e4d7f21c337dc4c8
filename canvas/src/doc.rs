//! Document model: strokes, the drawing that orders them, and the snapshot codec.
//!
//! A [`Drawing`] is the full unit of exchange with the store. Its operations
//! consume the drawing and hand back the next value, so a caller that still
//! needs the previous state clones it first; nothing is ever patched behind
//! a caller's back.
//!
//! The snapshot codec writes an ordered JSON list and reads both lists and
//! index-keyed objects (`{"0": …, "1": …}`), which is how older clients
//! stored the same data. Field names (`stroke`, `strokeWidth`, `data`) match
//! what those clients wrote so existing drawings keep loading.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::consts::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, MIN_STROKE_WIDTH};
use crate::coords::Point;

const FIELD_COLOR: &str = "stroke";
const FIELD_WIDTH: &str = "strokeWidth";
const FIELD_POINTS: &str = "data";

/// Error returned by [`Drawing::from_snapshot`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    /// A value had the wrong JSON type.
    #[error("expected {expected}, found {found}")]
    UnexpectedType { expected: &'static str, found: &'static str },
    /// An index-keyed object used a key that is not a non-negative integer.
    #[error("sequence key `{0}` is not an index")]
    InvalidKey(String),
    /// A point was missing a coordinate or carried a non-numeric one.
    #[error("invalid point: {0}")]
    InvalidPoint(String),
}

/// A CSS color string, e.g. `"#000"` or `"red"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(DEFAULT_STROKE_COLOR)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One continuous pointer-down-to-pointer-up path with a fixed style.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    /// Line color.
    pub color: Color,
    /// Line width in CSS pixels. Never below [`MIN_STROKE_WIDTH`].
    pub width: u32,
    /// Surface-relative points in drawing order.
    pub points: Vec<Point>,
}

impl Stroke {
    /// Start a stroke at `point`. Widths below the minimum are raised to it.
    #[must_use]
    pub fn new(color: Color, width: u32, point: Point) -> Self {
        Self { color, width: width.max(MIN_STROKE_WIDTH), points: vec![point] }
    }

    fn to_value(&self) -> Value {
        let points = self
            .points
            .iter()
            .map(|p| json!({ "x": p.x, "y": p.y }))
            .collect::<Vec<_>>();
        json!({
            FIELD_COLOR: self.color.as_str(),
            FIELD_WIDTH: self.width,
            FIELD_POINTS: points,
        })
    }

    fn from_value(value: &Value) -> Result<Self, SnapshotError> {
        let Value::Object(fields) = value else {
            return Err(SnapshotError::UnexpectedType { expected: "stroke object", found: kind(value) });
        };

        let color = match fields.get(FIELD_COLOR) {
            None | Some(Value::Null) => Color::default(),
            Some(Value::String(s)) => Color::new(s.clone()),
            Some(other) => {
                return Err(SnapshotError::UnexpectedType { expected: "color string", found: kind(other) });
            }
        };

        let width = match fields.get(FIELD_WIDTH) {
            None | Some(Value::Null) => DEFAULT_STROKE_WIDTH,
            Some(Value::Number(n)) => n.as_f64().map_or(DEFAULT_STROKE_WIDTH, width_from_f64),
            Some(other) => {
                return Err(SnapshotError::UnexpectedType { expected: "numeric width", found: kind(other) });
            }
        };

        let points = match fields.get(FIELD_POINTS) {
            None => Vec::new(),
            Some(raw) => ordered_entries(raw)?
                .into_iter()
                .map(point_from_value)
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(Self { color, width, points })
    }
}

/// Ordered sequence of strokes; order is paint order and undo order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drawing {
    strokes: Vec<Stroke>,
}

impl Drawing {
    /// An empty drawing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a drawing from strokes, dropping any stroke without points.
    #[must_use]
    pub fn from_strokes(strokes: Vec<Stroke>) -> Self {
        Self { strokes: strokes.into_iter().filter(|s| !s.points.is_empty()).collect() }
    }

    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// The stroke that receives appended points, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Stroke> {
        self.strokes.last()
    }

    /// Total number of points across all strokes.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }

    // --- Operations ---

    /// Append a new one-point stroke.
    #[must_use]
    pub fn begin_stroke(mut self, point: Point, color: Color, width: u32) -> Self {
        self.strokes.push(Stroke::new(color, width, point));
        self
    }

    /// Append `point` to the last stroke. An empty drawing is returned unchanged.
    #[must_use]
    pub fn append_point(mut self, point: Point) -> Self {
        match self.strokes.last_mut() {
            Some(stroke) => stroke.points.push(point),
            None => warn!(x = point.x, y = point.y, "append_point on empty drawing; ignored"),
        }
        self
    }

    /// Remove the last stroke. An empty drawing is returned unchanged.
    #[must_use]
    pub fn undo(mut self) -> Self {
        self.strokes.pop();
        self
    }

    /// Drop every stroke.
    #[must_use]
    pub fn clear(self) -> Self {
        Self::new()
    }

    // --- Snapshot codec ---

    /// Encode as the ordered-list snapshot pushed to the store.
    ///
    /// Strokes without points are never written.
    #[must_use]
    pub fn to_snapshot(&self) -> Value {
        Value::Array(
            self.strokes
                .iter()
                .filter(|s| !s.points.is_empty())
                .map(Stroke::to_value)
                .collect(),
        )
    }

    /// Decode a stored snapshot.
    ///
    /// Accepts an ordered list or an index-keyed object at both the stroke
    /// and the point level. `null` entries (holes left by sparse arrays) are
    /// skipped, as are strokes that end up with no points. A missing color
    /// or width falls back to the default; a fractional width is rounded.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the value does not describe a drawing.
    pub fn from_snapshot(value: &Value) -> Result<Self, SnapshotError> {
        let mut strokes = Vec::new();
        for entry in ordered_entries(value)? {
            let stroke = Stroke::from_value(entry)?;
            if !stroke.points.is_empty() {
                strokes.push(stroke);
            }
        }
        Ok(Self { strokes })
    }

    /// Decode whatever the store handed over. Absent or malformed values become an empty drawing.
    #[must_use]
    pub fn from_remote(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::new();
        };
        match Self::from_snapshot(value) {
            Ok(drawing) => drawing,
            Err(e) => {
                warn!(error = %e, "malformed drawing snapshot; treating as empty");
                Self::new()
            }
        }
    }
}

// =============================================================
// Helpers
// =============================================================

/// Flatten a list or index-keyed object into its entries in index order.
fn ordered_entries(value: &Value) -> Result<Vec<&Value>, SnapshotError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().filter(|v| !v.is_null()).collect()),
        Value::Object(map) => indexed_entries(map),
        other => Err(SnapshotError::UnexpectedType { expected: "list or index-keyed object", found: kind(other) }),
    }
}

fn indexed_entries(map: &Map<String, Value>) -> Result<Vec<&Value>, SnapshotError> {
    let mut keyed = Vec::with_capacity(map.len());
    for (key, value) in map {
        // Only canonical decimal keys, so "01" and "+1" cannot alias "1".
        let index = match key.parse::<usize>() {
            Ok(index) if index.to_string() == *key => index,
            _ => return Err(SnapshotError::InvalidKey(key.clone())),
        };
        if !value.is_null() {
            keyed.push((index, value));
        }
    }
    keyed.sort_by_key(|(index, _)| *index);
    Ok(keyed.into_iter().map(|(_, value)| value).collect())
}

fn point_from_value(value: &Value) -> Result<Point, SnapshotError> {
    let point: Point = Point::deserialize(value).map_err(|e| SnapshotError::InvalidPoint(e.to_string()))?;
    if !point.is_finite() {
        return Err(SnapshotError::InvalidPoint(format!("non-finite coordinates ({}, {})", point.x, point.y)));
    }
    Ok(point)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn width_from_f64(raw: f64) -> u32 {
    if !raw.is_finite() {
        return DEFAULT_STROKE_WIDTH;
    }
    raw.round().clamp(f64::from(MIN_STROKE_WIDTH), f64::from(u32::MAX)) as u32
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
