//! A drawing bound to a store path.
//!
//! `Board` connects an [`EngineCore`] to a [`Gateway`]: local input runs
//! through the engine, `Persist` actions are written to the path, and every
//! snapshot the gateway delivers replaces the local drawing. The listener
//! passed to [`Board::attach`] is called whenever the drawing changes, from
//! either side.

#[cfg(test)]
#[path = "board_test.rs"]
mod board_test;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::coords::{BoundingBox, PointerInput};
use crate::doc::{Color, Drawing};
use crate::engine::{Action, EngineCore};
use crate::gateway::{Gateway, GatewayError, SnapshotCallback, SubscriptionId};
use crate::input::{InputState, Style, Swatch};

type ChangeListener = Box<dyn FnMut(&Drawing)>;
type SharedListener = Rc<RefCell<Option<ChangeListener>>>;

pub struct Board<G: Gateway> {
    core: Rc<RefCell<EngineCore>>,
    listener: SharedListener,
    gateway: G,
    path: String,
    subscription: Option<SubscriptionId>,
}

impl<G: Gateway> Board<G> {
    pub fn new(gateway: G, path: impl Into<String>) -> Self {
        Self {
            core: Rc::new(RefCell::new(EngineCore::new())),
            listener: Rc::new(RefCell::new(None)),
            gateway,
            path: path.into(),
            subscription: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to the path and start mirroring it.
    ///
    /// The listener replaces any previous one. Attaching twice keeps the
    /// existing subscription.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error when the subscription cannot be created.
    pub fn attach(&mut self, listener: impl FnMut(&Drawing) + 'static) -> Result<(), GatewayError> {
        *self.listener.borrow_mut() = Some(Box::new(listener));
        if self.subscription.is_some() {
            return Ok(());
        }

        let core = Rc::clone(&self.core);
        let listener = Rc::clone(&self.listener);
        let path = self.path.clone();
        let callback: SnapshotCallback = Box::new(move |value| {
            let drawing = Drawing::from_remote(value);
            let Ok(mut engine) = core.try_borrow_mut() else {
                warn!(path = %path, "snapshot arrived while the engine was busy; dropped");
                return;
            };
            engine.load_snapshot(drawing);
            notify(&listener, &engine.drawing);
        });

        let id = self.gateway.subscribe(&self.path, callback)?;
        self.subscription = Some(id);
        info!(path = %self.path, "board attached");
        Ok(())
    }

    /// Cancel the subscription and drop the listener. Safe to call repeatedly.
    pub fn detach(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.gateway.unsubscribe(id);
            info!(path = %self.path, "board detached");
        }
        *self.listener.borrow_mut() = None;
    }

    // --- Input ---

    /// # Errors
    ///
    /// Propagates gateway write failures.
    pub fn pointer_down(&self, input: &PointerInput, bounds: &BoundingBox) -> Result<(), GatewayError> {
        let actions = self.core.borrow_mut().on_pointer_down(input, bounds);
        self.apply(actions)
    }

    /// # Errors
    ///
    /// Propagates gateway write failures.
    pub fn pointer_move(&self, input: &PointerInput, bounds: &BoundingBox) -> Result<(), GatewayError> {
        let actions = self.core.borrow_mut().on_pointer_move(input, bounds);
        self.apply(actions)
    }

    /// # Errors
    ///
    /// Propagates gateway write failures.
    pub fn pointer_up(&self) -> Result<(), GatewayError> {
        let actions = self.core.borrow_mut().on_pointer_up();
        self.apply(actions)
    }

    /// # Errors
    ///
    /// Propagates gateway write failures.
    pub fn undo(&self) -> Result<(), GatewayError> {
        let actions = self.core.borrow_mut().undo();
        self.apply(actions)
    }

    /// # Errors
    ///
    /// Propagates gateway write failures.
    pub fn clear(&self) -> Result<(), GatewayError> {
        let actions = self.core.borrow_mut().clear();
        self.apply(actions)
    }

    // --- Style ---

    pub fn select_swatch(&self, swatch: Swatch) {
        self.core.borrow_mut().select_swatch(swatch);
    }

    pub fn set_color(&self, color: Color) {
        self.core.borrow_mut().set_color(color);
    }

    pub fn set_width_text(&self, raw: &str) -> bool {
        self.core.borrow_mut().set_width_text(raw)
    }

    // --- Queries ---

    #[must_use]
    pub fn drawing(&self) -> Drawing {
        self.core.borrow().drawing.clone()
    }

    #[must_use]
    pub fn style(&self) -> Style {
        self.core.borrow().style.clone()
    }

    #[must_use]
    pub fn input_state(&self) -> InputState {
        self.core.borrow().input
    }

    fn apply(&self, actions: Vec<Action>) -> Result<(), GatewayError> {
        let mut result = Ok(());
        for action in actions {
            match action {
                Action::RenderNeeded => notify(&self.listener, &self.core.borrow().drawing),
                Action::Persist(drawing) => {
                    debug!(path = %self.path, strokes = drawing.len(), "persisting drawing");
                    if let Err(e) = self.gateway.set(&self.path, drawing.to_snapshot()) {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }
}

impl<G: Gateway> Drop for Board<G> {
    fn drop(&mut self) {
        self.detach();
    }
}

fn notify(listener: &RefCell<Option<ChangeListener>>, drawing: &Drawing) {
    match listener.try_borrow_mut() {
        Ok(mut slot) => {
            if let Some(listener) = slot.as_mut() {
                listener(drawing);
            }
        }
        Err(_) => debug!("change listener busy; notification skipped"),
    }
}
