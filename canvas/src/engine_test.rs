#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::consts::DEFAULT_STROKE_WIDTH;

// =============================================================
// Helpers
// =============================================================

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn origin() -> BoundingBox {
    BoundingBox::new(0.0, 0.0, 400.0, 400.0)
}

fn mouse(x: f64, y: f64) -> PointerInput {
    PointerInput::mouse(x, y)
}

fn has_render_needed(actions: &[Action]) -> bool {
    actions.iter().any(|a| matches!(a, Action::RenderNeeded))
}

fn persisted(actions: &[Action]) -> Option<&Drawing> {
    actions.iter().find_map(|a| match a {
        Action::Persist(drawing) => Some(drawing),
        Action::RenderNeeded => None,
    })
}

fn core_with_strokes(count: usize) -> EngineCore {
    let mut core = EngineCore::new();
    for i in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let at = i as f64;
        core.on_pointer_down(&mouse(at, at), &origin());
        core.on_pointer_up();
    }
    core
}

// =============================================================
// EngineCore: construction and defaults
// =============================================================

#[test]
fn core_new_is_idle_and_empty() {
    let core = EngineCore::new();
    assert!(core.drawing.is_empty());
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn core_default_style_is_black_width_five() {
    let core = EngineCore::new();
    assert_eq!(core.style.color, Color::from("#000"));
    assert_eq!(core.style.width, DEFAULT_STROKE_WIDTH);
}

// =============================================================
// EngineCore: style
// =============================================================

#[test]
fn select_swatch_changes_next_stroke_color() {
    let mut core = EngineCore::new();
    core.select_swatch(Swatch::Blue);
    core.on_pointer_down(&mouse(1.0, 1.0), &origin());
    assert_eq!(core.drawing.strokes()[0].color, Color::from("blue"));
}

#[test]
fn set_width_text_rejects_invalid_and_keeps_current() {
    let mut core = EngineCore::new();
    assert!(core.set_width_text("9"));
    assert!(!core.set_width_text("wide"));
    assert_eq!(core.style.width, 9);
}

#[test]
fn style_change_does_not_touch_existing_strokes() {
    let mut core = core_with_strokes(1);
    core.set_color(Color::from("red"));
    assert!(core.set_width(11));
    let stroke = &core.drawing.strokes()[0];
    assert_eq!(stroke.color, Color::default());
    assert_eq!(stroke.width, DEFAULT_STROKE_WIDTH);
}

// =============================================================
// Pointer down
// =============================================================

#[test]
fn pointer_down_begins_stroke_and_enters_drawing() {
    let mut core = EngineCore::new();
    let actions = core.on_pointer_down(&mouse(10.0, 20.0), &BoundingBox::new(5.0, 5.0, 400.0, 400.0));
    assert!(has_render_needed(&actions));
    assert!(persisted(&actions).is_none());
    assert_eq!(core.input, InputState::Drawing);
    assert_eq!(core.drawing.strokes()[0].points, vec![pt(5.0, 15.0)]);
}

#[test]
fn pointer_down_while_drawing_starts_another_stroke() {
    let mut core = EngineCore::new();
    core.on_pointer_down(&mouse(0.0, 0.0), &origin());
    core.on_pointer_down(&mouse(3.0, 3.0), &origin());
    assert_eq!(core.drawing.len(), 2);
    assert_eq!(core.input, InputState::Drawing);
}

#[test]
fn touch_down_uses_first_touch() {
    let mut core = EngineCore::new();
    let touch = PointerInput::touch(vec![pt(30.0, 40.0), pt(90.0, 90.0)]);
    core.on_pointer_down(&touch, &BoundingBox::new(10.0, 10.0, 400.0, 400.0));
    assert_eq!(core.drawing.strokes()[0].points, vec![pt(20.0, 30.0)]);
}

#[test]
fn touch_without_touches_is_ignored() {
    let mut core = EngineCore::new();
    let actions = core.on_pointer_down(&PointerInput::touch(Vec::new()), &origin());
    assert!(actions.is_empty());
    assert!(core.drawing.is_empty());
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn non_finite_position_is_ignored() {
    let mut core = EngineCore::new();
    let actions = core.on_pointer_down(&mouse(f64::NAN, 1.0), &origin());
    assert!(actions.is_empty());
    assert!(core.drawing.is_empty());
}

// =============================================================
// Pointer move
// =============================================================

#[test]
fn pointer_move_while_idle_is_ignored() {
    let mut core = core_with_strokes(1);
    let before = core.drawing.clone();
    let actions = core.on_pointer_move(&mouse(50.0, 50.0), &origin());
    assert!(actions.is_empty());
    assert_eq!(core.drawing, before);
}

#[test]
fn pointer_move_while_drawing_appends_to_last_stroke() {
    let mut core = EngineCore::new();
    core.on_pointer_down(&mouse(0.0, 0.0), &origin());
    core.on_pointer_move(&mouse(1.0, 2.0), &origin());
    let actions = core.on_pointer_move(&mouse(3.0, 4.0), &origin());
    assert!(has_render_needed(&actions));
    assert_eq!(core.drawing.strokes()[0].points, vec![pt(0.0, 0.0), pt(1.0, 2.0), pt(3.0, 4.0)]);
}

// =============================================================
// Pointer up
// =============================================================

#[test]
fn pointer_up_persists_and_returns_to_idle() {
    let mut core = EngineCore::new();
    core.on_pointer_down(&mouse(0.0, 0.0), &origin());
    let actions = core.on_pointer_up();
    assert_eq!(core.input, InputState::Idle);
    assert_eq!(persisted(&actions), Some(&core.drawing));
}

#[test]
fn pointer_up_while_idle_still_persists() {
    let mut core = EngineCore::new();
    let actions = core.on_pointer_up();
    assert_eq!(persisted(&actions), Some(&Drawing::new()));
}

#[test]
fn full_gesture_persists_single_stroke_snapshot() {
    let mut core = EngineCore::new();
    core.set_color(Color::from("red"));
    assert!(core.set_width(3));
    core.on_pointer_down(&mouse(0.0, 0.0), &origin());
    core.on_pointer_move(&mouse(5.0, 5.0), &origin());
    let actions = core.on_pointer_up();
    let drawing = persisted(&actions).cloned().unwrap_or_default();
    assert_eq!(
        drawing.to_snapshot(),
        json!([{"stroke": "red", "strokeWidth": 3, "data": [{"x": 0.0, "y": 0.0}, {"x": 5.0, "y": 5.0}]}])
    );
}

// =============================================================
// Undo / clear
// =============================================================

#[test]
fn undo_removes_last_stroke_and_persists() {
    let mut core = core_with_strokes(2);
    let actions = core.undo();
    assert!(has_render_needed(&actions));
    assert_eq!(core.drawing.len(), 1);
    assert_eq!(persisted(&actions).map(Drawing::len), Some(1));
}

#[test]
fn undo_on_empty_persists_empty() {
    let mut core = EngineCore::new();
    let actions = core.undo();
    assert_eq!(persisted(&actions), Some(&Drawing::new()));
}

#[test]
fn clear_empties_and_persists() {
    let mut core = core_with_strokes(3);
    let actions = core.clear();
    assert!(core.drawing.is_empty());
    assert_eq!(persisted(&actions), Some(&Drawing::new()));
}

// =============================================================
// Remote snapshots
// =============================================================

#[test]
fn load_snapshot_replaces_drawing_and_keeps_gesture_state() {
    let mut core = EngineCore::new();
    core.on_pointer_down(&mouse(0.0, 0.0), &origin());
    let remote = Drawing::new()
        .begin_stroke(pt(7.0, 7.0), Color::from("blue"), 2)
        .begin_stroke(pt(8.0, 8.0), Color::from("blue"), 2);
    core.load_snapshot(remote);
    assert_eq!(core.input, InputState::Drawing);
    assert_eq!(core.drawing.len(), 2);

    core.on_pointer_move(&mouse(9.0, 9.0), &origin());
    assert_eq!(core.drawing.strokes()[1].points, vec![pt(8.0, 8.0), pt(9.0, 9.0)]);
    assert_eq!(core.drawing.strokes()[0].points, vec![pt(7.0, 7.0)]);
}

#[test]
fn load_empty_snapshot_mid_stroke_drops_moves() {
    let mut core = EngineCore::new();
    core.on_pointer_down(&mouse(0.0, 0.0), &origin());
    core.load_snapshot(Drawing::new());
    core.on_pointer_move(&mouse(1.0, 1.0), &origin());
    assert!(core.drawing.is_empty());
}
