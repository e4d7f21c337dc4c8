use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Element, Event, HtmlCanvasElement, HtmlImageElement};

use crate::board::Board;
use crate::consts::{BACKGROUND_URL, DRAWING_PATH};
use crate::coords::{self, BoundingBox, Point, PointerInput};
use crate::doc::{Color, Drawing};
use crate::dom;
use crate::gateway::GatewayError;
use crate::input::{InputState, Style, Swatch};
use crate::net::WsGateway;
use crate::render;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The drawing changed locally and should be redrawn.
    RenderNeeded,
    /// Push this drawing to the persistence gateway.
    Persist(Drawing),
}

/// Core engine state: all logic that doesn't depend on the browser.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
#[derive(Debug, Default)]
pub struct EngineCore {
    pub drawing: Drawing,
    pub style: Style,
    pub input: InputState,
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Data inputs ---

    /// Replace the drawing with a snapshot from the gateway.
    ///
    /// The gesture state is left alone, so a stroke in progress keeps
    /// appending to whatever is now the last stroke.
    pub fn load_snapshot(&mut self, drawing: Drawing) {
        debug!(strokes = drawing.len(), drawing = self.input.is_drawing(), "snapshot loaded");
        self.drawing = drawing;
    }

    // --- Style ---

    pub fn select_swatch(&mut self, swatch: Swatch) {
        self.style.color = swatch.color();
    }

    pub fn set_color(&mut self, color: Color) {
        self.style.color = color;
    }

    pub fn set_width(&mut self, width: u32) -> bool {
        self.style.set_width(width)
    }

    /// Set the width from the width field's text. Invalid text keeps the current width.
    pub fn set_width_text(&mut self, raw: &str) -> bool {
        let accepted = self.style.set_width_text(raw);
        if !accepted {
            debug!(raw, width = self.style.width, "width input rejected");
        }
        accepted
    }

    // --- Input events ---

    /// Start a new stroke at the pointer with the current style.
    pub fn on_pointer_down(&mut self, input: &PointerInput, bounds: &BoundingBox) -> Vec<Action> {
        let Some(point) = Self::local_point(input, bounds) else {
            return Vec::new();
        };
        let drawing = std::mem::take(&mut self.drawing);
        self.drawing = drawing.begin_stroke(point, self.style.color.clone(), self.style.width);
        self.input = InputState::Drawing;
        vec![Action::RenderNeeded]
    }

    /// Extend the stroke in progress. Ignored while idle.
    pub fn on_pointer_move(&mut self, input: &PointerInput, bounds: &BoundingBox) -> Vec<Action> {
        if !self.input.is_drawing() {
            return Vec::new();
        }
        let Some(point) = Self::local_point(input, bounds) else {
            return Vec::new();
        };
        let drawing = std::mem::take(&mut self.drawing);
        self.drawing = drawing.append_point(point);
        vec![Action::RenderNeeded]
    }

    /// Finish the gesture and persist the drawing.
    ///
    /// Always persists, even when no stroke was in progress.
    pub fn on_pointer_up(&mut self) -> Vec<Action> {
        self.input = InputState::Idle;
        vec![Action::Persist(self.drawing.clone())]
    }

    // --- Commands ---

    pub fn undo(&mut self) -> Vec<Action> {
        let drawing = std::mem::take(&mut self.drawing);
        self.drawing = drawing.undo();
        vec![Action::RenderNeeded, Action::Persist(self.drawing.clone())]
    }

    pub fn clear(&mut self) -> Vec<Action> {
        let drawing = std::mem::take(&mut self.drawing);
        self.drawing = drawing.clear();
        vec![Action::RenderNeeded, Action::Persist(self.drawing.clone())]
    }

    fn local_point(input: &PointerInput, bounds: &BoundingBox) -> Option<Point> {
        match coords::map(input, bounds) {
            Some(point) if point.is_finite() => Some(point),
            Some(point) => {
                warn!(x = point.x, y = point.y, "non-finite pointer position ignored");
                None
            }
            None => {
                warn!("touch event without active touches ignored");
                None
            }
        }
    }
}

// =============================================================================
// BROWSER ENGINE
// =============================================================================

/// Canvas context plus the background image, and the last drawing shown.
struct Surface {
    ctx: CanvasRenderingContext2d,
    background: HtmlImageElement,
    shown: RefCell<Drawing>,
}

impl Surface {
    fn show(&self, drawing: &Drawing) {
        *self.shown.borrow_mut() = drawing.clone();
        self.redraw();
    }

    fn redraw(&self) {
        if let Err(e) = render::draw(&self.ctx, &self.shown.borrow(), Some(&self.background)) {
            error!(error = ?e, "render failed");
        }
    }
}

/// The full canvas engine, exported to JavaScript.
///
/// Owns the input surface element (coordinates are relative to its bounding
/// box), the 2D canvas, and a [`Board`] wired to the store over a websocket.
#[wasm_bindgen]
pub struct Engine {
    surface: Element,
    view: Rc<Surface>,
    board: Board<WsGateway>,
}

#[wasm_bindgen]
impl Engine {
    /// Connect to the store at `ws_url` and start mirroring `path`
    /// (the shared drawing path when omitted).
    #[wasm_bindgen(constructor)]
    pub fn new(surface: Element, canvas: HtmlCanvasElement, ws_url: &str, path: Option<String>) -> Result<Engine, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        let background = HtmlImageElement::new()?;
        let view = Rc::new(Surface { ctx, background, shown: RefCell::new(Drawing::new()) });

        let onload = {
            let view = Rc::clone(&view);
            Closure::<dyn FnMut()>::new(move || view.redraw())
        };
        view.background.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();
        view.background.set_src(BACKGROUND_URL);

        let gateway = WsGateway::connect(ws_url).map_err(to_js)?;
        let mut board = Board::new(gateway, path.unwrap_or_else(|| DRAWING_PATH.to_owned()));
        let listener = Rc::clone(&view);
        board.attach(move |drawing| listener.show(drawing)).map_err(to_js)?;

        Ok(Self { surface, view, board })
    }

    pub fn pointer_down(&self, event: &Event) {
        let Some(input) = dom::claim_pointer(event) else {
            return;
        };
        let bounds = dom::bounding_box(&self.surface);
        report(self.board.pointer_down(&input, &bounds));
    }

    pub fn pointer_move(&self, event: &Event) {
        if !self.board.input_state().is_drawing() {
            return;
        }
        let Some(input) = dom::claim_pointer(event) else {
            return;
        };
        let bounds = dom::bounding_box(&self.surface);
        report(self.board.pointer_move(&input, &bounds));
    }

    /// Finish the gesture. Bound at document level so releases outside the
    /// canvas still end the stroke.
    pub fn pointer_up(&self) {
        report(self.board.pointer_up());
    }

    pub fn undo(&self) {
        report(self.board.undo());
    }

    pub fn clear(&self) {
        report(self.board.clear());
    }

    /// Select a swatch by CSS value or name. Returns false for unknown colors.
    pub fn select_color(&self, raw: &str) -> bool {
        match Swatch::parse(raw) {
            Some(swatch) => {
                self.board.select_swatch(swatch);
                true
            }
            None => {
                warn!(raw, "unknown color swatch");
                false
            }
        }
    }

    /// Apply the width field's text. Returns false when it was rejected.
    pub fn set_width(&self, raw: &str) -> bool {
        self.board.set_width_text(raw)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.board.style().width
    }

    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.board.drawing().len()
    }

    /// Redraw the current drawing.
    pub fn render(&self) {
        self.view.show(&self.board.drawing());
    }

    /// Stop mirroring the store and close the connection.
    pub fn detach(&mut self) {
        self.board.detach();
        self.board.gateway().close();
    }
}

fn report(result: Result<(), GatewayError>) {
    if let Err(e) = result {
        error!(error = %e, "failed to persist drawing");
    }
}

fn to_js(err: GatewayError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
