//! DOM adapter tests. Run in a browser with `wasm-pack test --headless --firefox canvas`.
#![cfg(target_arch = "wasm32")]

use canvas::coords::PointerInput;
use canvas::dom;
use wasm_bindgen_test::*;
use web_sys::{Event, EventInit, MouseEvent};

wasm_bindgen_test_configure!(run_in_browser);

fn cancelable(kind: &str) -> Event {
    let init = EventInit::new();
    init.set_cancelable(true);
    Event::new_with_event_init_dict(kind, &init).unwrap()
}

#[wasm_bindgen_test]
fn claim_cancels_default_even_without_a_point() {
    // A "touchstart" that is not a TouchEvent carries no touch list.
    let event = cancelable("touchstart");
    assert_eq!(dom::claim_pointer(&event), None);
    assert!(event.default_prevented());
}

#[wasm_bindgen_test]
fn claim_reads_mouse_position() {
    let event: Event = MouseEvent::new("mousedown").unwrap().into();
    assert_eq!(dom::claim_pointer(&event), Some(PointerInput::mouse(0.0, 0.0)));
}

#[wasm_bindgen_test]
fn pointer_input_leaves_default_alone() {
    let event = cancelable("touchmove");
    assert_eq!(dom::pointer_input(&event), None);
    assert!(!event.default_prevented());
}
