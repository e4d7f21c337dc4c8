//! DOM adapters: browser events and elements into plain engine types.

use wasm_bindgen::JsCast;
use web_sys::{Element, Event, MouseEvent, TouchEvent};

use crate::coords::{BoundingBox, Point, PointerInput};

/// Read the pointer position out of a mouse or touch event.
///
/// Any event whose type name contains `touch` is read as a touch event, using
/// the currently active touches. Returns `None` for events that are neither.
#[must_use]
pub fn pointer_input(event: &Event) -> Option<PointerInput> {
    if event.type_().contains("touch") {
        let touch = event.dyn_ref::<TouchEvent>()?;
        let list = touch.touches();
        let touches = (0..list.length())
            .filter_map(|i| list.get(i))
            .map(|t| Point::new(f64::from(t.client_x()), f64::from(t.client_y())))
            .collect();
        return Some(PointerInput::touch(touches));
    }
    let mouse = event.dyn_ref::<MouseEvent>()?;
    Some(PointerInput::mouse(f64::from(mouse.client_x()), f64::from(mouse.client_y())))
}

/// Take over a pointer event for the drawing surface.
///
/// The browser default (scrolling, text selection, synthetic mouse events)
/// is cancelled before the event is read, so it is suppressed even when the
/// event carries no usable point.
#[must_use]
pub fn claim_pointer(event: &Event) -> Option<PointerInput> {
    event.prevent_default();
    pointer_input(event)
}

/// Viewport-relative bounding box of `element`.
#[must_use]
pub fn bounding_box(element: &Element) -> BoundingBox {
    let rect = element.get_bounding_client_rect();
    BoundingBox::new(rect.left(), rect.top(), rect.width(), rect.height())
}
