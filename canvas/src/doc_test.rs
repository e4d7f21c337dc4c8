#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn red() -> Color {
    Color::from("red")
}

fn two_stroke_drawing() -> Drawing {
    Drawing::new()
        .begin_stroke(pt(0.0, 0.0), red(), 3)
        .append_point(pt(5.0, 5.0))
        .begin_stroke(pt(10.0, 12.5), Color::from("blue"), 7)
}

// =============================================================
// Color
// =============================================================

#[test]
fn color_default_is_black() {
    assert_eq!(Color::default().as_str(), "#000");
}

#[test]
fn color_display_matches_value() {
    assert_eq!(Color::from("blue").to_string(), "blue");
}

// =============================================================
// begin_stroke / append_point
// =============================================================

#[test]
fn begin_stroke_adds_one_point_stroke() {
    let drawing = Drawing::new().begin_stroke(pt(0.0, 0.0), red(), 3);
    assert_eq!(drawing.len(), 1);
    let stroke = &drawing.strokes()[0];
    assert_eq!(stroke.color, red());
    assert_eq!(stroke.width, 3);
    assert_eq!(stroke.points, vec![pt(0.0, 0.0)]);
}

#[test]
fn begin_stroke_raises_zero_width_to_minimum() {
    let drawing = Drawing::new().begin_stroke(pt(0.0, 0.0), red(), 0);
    assert_eq!(drawing.strokes()[0].width, MIN_STROKE_WIDTH);
}

#[test]
fn begin_stroke_leaves_clone_of_input_untouched() {
    let before = Drawing::new().begin_stroke(pt(1.0, 1.0), red(), 3);
    let after = before.clone().begin_stroke(pt(2.0, 2.0), red(), 3);
    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 2);
}

#[test]
fn append_point_extends_last_stroke_only() {
    let drawing = Drawing::new()
        .begin_stroke(pt(0.0, 0.0), red(), 3)
        .begin_stroke(pt(1.0, 1.0), red(), 3)
        .append_point(pt(2.0, 2.0));
    assert_eq!(drawing.strokes()[0].points.len(), 1);
    assert_eq!(drawing.strokes()[1].points, vec![pt(1.0, 1.0), pt(2.0, 2.0)]);
}

#[test]
fn append_point_on_empty_is_noop() {
    let drawing = Drawing::new().append_point(pt(3.0, 4.0));
    assert!(drawing.is_empty());
}

#[test]
fn stroke_and_point_counts_follow_calls() {
    // begin, append x2, begin, append x0, begin, append x3
    let plan = [2usize, 0, 3];
    let mut drawing = Drawing::new();
    for (i, appends) in plan.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let base = i as f64;
        drawing = drawing.begin_stroke(pt(base, base), red(), 2);
        for j in 0..*appends {
            #[allow(clippy::cast_precision_loss)]
            let offset = j as f64;
            drawing = drawing.append_point(pt(base + offset, base));
        }
    }
    assert_eq!(drawing.len(), plan.len());
    for (stroke, appends) in drawing.strokes().iter().zip(plan) {
        assert_eq!(stroke.points.len(), 1 + appends);
    }
    assert_eq!(drawing.point_count(), 3 + 5);
}

// =============================================================
// undo / clear
// =============================================================

#[test]
fn undo_removes_last_stroke() {
    let drawing = two_stroke_drawing();
    let expected_first = drawing.strokes()[0].clone();
    let undone = drawing.undo();
    assert_eq!(undone.len(), 1);
    assert_eq!(undone.strokes()[0], expected_first);
}

#[test]
fn undo_on_empty_stays_empty() {
    let drawing = Drawing::new().undo().undo();
    assert!(drawing.is_empty());
}

#[test]
fn clear_always_yields_empty() {
    assert!(two_stroke_drawing().clear().is_empty());
    assert!(Drawing::new().clear().is_empty());
}

#[test]
fn from_strokes_drops_empty_strokes() {
    let empty = Stroke { color: red(), width: 2, points: Vec::new() };
    let full = Stroke::new(red(), 2, pt(1.0, 1.0));
    let drawing = Drawing::from_strokes(vec![empty, full.clone()]);
    assert_eq!(drawing.strokes(), &[full]);
}

// =============================================================
// Snapshot encoding
// =============================================================

#[test]
fn to_snapshot_is_ordered_list_with_legacy_field_names() {
    let snapshot = Drawing::new()
        .begin_stroke(pt(0.0, 0.0), red(), 3)
        .append_point(pt(5.0, 5.0))
        .to_snapshot();
    assert_eq!(
        snapshot,
        json!([{
            "stroke": "red",
            "strokeWidth": 3,
            "data": [{"x": 0.0, "y": 0.0}, {"x": 5.0, "y": 5.0}],
        }])
    );
}

#[test]
fn to_snapshot_skips_strokes_without_points() {
    let mut stroke = Stroke::new(red(), 2, pt(0.0, 0.0));
    stroke.points.clear();
    let drawing = Drawing { strokes: vec![stroke] };
    assert_eq!(drawing.to_snapshot(), json!([]));
}

#[test]
fn empty_drawing_encodes_as_empty_list() {
    assert_eq!(Drawing::new().to_snapshot(), json!([]));
}

// =============================================================
// Snapshot decoding
// =============================================================

#[test]
fn snapshot_survives_encode_then_decode() {
    let drawing = two_stroke_drawing();
    let decoded = Drawing::from_snapshot(&drawing.to_snapshot()).unwrap();
    assert_eq!(decoded, drawing);
}

#[test]
fn decode_index_keyed_objects_in_numeric_order() {
    let value = json!({
        "10": {"stroke": "blue", "strokeWidth": 1, "data": {"0": {"x": 9, "y": 9}}},
        "2": {"stroke": "red", "strokeWidth": 4, "data": {"1": {"x": 2, "y": 2}, "0": {"x": 1, "y": 1}}},
    });
    let drawing = Drawing::from_snapshot(&value).unwrap();
    assert_eq!(drawing.len(), 2);
    assert_eq!(drawing.strokes()[0].color, red());
    assert_eq!(drawing.strokes()[0].points, vec![pt(1.0, 1.0), pt(2.0, 2.0)]);
    assert_eq!(drawing.strokes()[1].color, Color::from("blue"));
}

#[test]
fn decode_null_is_empty() {
    assert!(Drawing::from_snapshot(&Value::Null).unwrap().is_empty());
}

#[test]
fn decode_skips_null_holes_and_pointless_strokes() {
    let value = json!([
        null,
        {"stroke": "red", "strokeWidth": 2, "data": []},
        {"stroke": "red", "strokeWidth": 2},
        {"stroke": "red", "strokeWidth": 2, "data": [null, {"x": 1, "y": 2}]},
    ]);
    let drawing = Drawing::from_snapshot(&value).unwrap();
    assert_eq!(drawing.len(), 1);
    assert_eq!(drawing.strokes()[0].points, vec![pt(1.0, 2.0)]);
}

#[test]
fn decode_defaults_missing_style() {
    let drawing = Drawing::from_snapshot(&json!([{"data": [{"x": 0, "y": 0}]}])).unwrap();
    let stroke = &drawing.strokes()[0];
    assert_eq!(stroke.color, Color::default());
    assert_eq!(stroke.width, DEFAULT_STROKE_WIDTH);
}

#[test]
fn decode_normalizes_width() {
    let value = json!([
        {"strokeWidth": 2.6, "data": [{"x": 0, "y": 0}]},
        {"strokeWidth": -4, "data": [{"x": 0, "y": 0}]},
        {"strokeWidth": null, "data": [{"x": 0, "y": 0}]},
    ]);
    let drawing = Drawing::from_snapshot(&value).unwrap();
    let widths = drawing.strokes().iter().map(|s| s.width).collect::<Vec<_>>();
    assert_eq!(widths, vec![3, MIN_STROKE_WIDTH, DEFAULT_STROKE_WIDTH]);
}

#[test]
fn decode_rejects_non_index_keys() {
    let err = Drawing::from_snapshot(&json!({"first": {"data": []}})).unwrap_err();
    assert_eq!(err, SnapshotError::InvalidKey("first".into()));
}

#[test]
fn decode_rejects_scalar_snapshot() {
    let err = Drawing::from_snapshot(&json!("nope")).unwrap_err();
    assert!(matches!(err, SnapshotError::UnexpectedType { found: "string", .. }));
}

#[test]
fn decode_rejects_bad_point() {
    let err = Drawing::from_snapshot(&json!([{"data": [{"x": "a", "y": 0}]}])).unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidPoint(_)));
}

#[test]
fn decode_rejects_non_string_color() {
    let err = Drawing::from_snapshot(&json!([{"stroke": 7, "data": [{"x": 0, "y": 0}]}])).unwrap_err();
    assert!(matches!(err, SnapshotError::UnexpectedType { expected: "color string", .. }));
}

#[test]
fn from_remote_absent_or_malformed_is_empty() {
    assert!(Drawing::from_remote(None).is_empty());
    assert!(Drawing::from_remote(Some(&json!(42))).is_empty());
    assert!(Drawing::from_remote(Some(&json!({"x": 1}))).is_empty());
}

#[test]
fn from_remote_well_formed_decodes() {
    let drawing = two_stroke_drawing();
    assert_eq!(Drawing::from_remote(Some(&drawing.to_snapshot())), drawing);
}

#[test]
fn decode_rejects_non_canonical_index_keys() {
    for key in ["01", "+1", " 1"] {
        let value = json!({"1": {"data": [{"x": 0, "y": 0}]}, key: {"data": [{"x": 5, "y": 5}]}});
        let err = Drawing::from_snapshot(&value).unwrap_err();
        assert_eq!(err, SnapshotError::InvalidKey(key.into()));
    }
    let points = json!([{"data": {"0": {"x": 0, "y": 0}, "00": {"x": 1, "y": 1}}}]);
    assert_eq!(Drawing::from_snapshot(&points).unwrap_err(), SnapshotError::InvalidKey("00".into()));
}
