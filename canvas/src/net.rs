//! Websocket gateway to the store server.
//!
//! DESIGN
//! ======
//! [`FrameGateway`] speaks the JSON frames from the `frames` crate over any
//! [`Link`]; [`WsGateway`] is that gateway over a browser [`WebSocket`].
//! Everything except the socket lives in [`StoreRouter`], a plain struct:
//!
//! - One server subscription per path. Later local subscribers to the same
//!   path get a one-shot `store:get` instead.
//! - A `store:subscribe`/`store:get` reply goes only to the subscription that
//!   asked for it. A reply that was requested before a later local write to
//!   the path is stale and dropped; the write already reached that subscriber.
//! - Local writes reach local subscribers synchronously inside `set`. The
//!   server pushes `store:value` to every other connection, never back to the
//!   writer, so a write is applied exactly once.
//!
//! Frames written before the socket opens are queued and flushed from `onopen`.

#[cfg(test)]
#[path = "net_test.rs"]
mod net_test;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use frames::{Frame, Status};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use crate::gateway::{Gateway, GatewayError, SharedCallback, SnapshotCallback, SubscriptionId, check_path, deliver};

// =============================================================================
// ROUTER
// =============================================================================

struct LocalSubscription {
    path: String,
    callback: SharedCallback,
}

/// A read request waiting for its reply.
struct PendingRead {
    subscription: SubscriptionId,
    path: String,
    /// Local write sequence for the path when the request was sent.
    seen_write: u64,
}

/// Values owed to local subscribers. Run it after releasing the router.
#[must_use]
pub(crate) struct Delivery {
    callbacks: Vec<SharedCallback>,
    value: Option<Value>,
}

impl Delivery {
    pub(crate) fn run(&self) {
        for callback in &self.callbacks {
            deliver(callback, self.value.as_ref());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[cfg(test)]
    pub(crate) fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// Subscription table and inbound frame routing, independent of the transport.
#[derive(Default)]
pub(crate) struct StoreRouter {
    subscriptions: BTreeMap<SubscriptionId, LocalSubscription>,
    next_id: u64,
    /// Keyed by request frame id.
    reads: HashMap<String, PendingRead>,
    writes: u64,
    /// Sequence number of the latest local write per path.
    last_write: HashMap<String, u64>,
}

impl StoreRouter {
    /// Register a local subscriber and build the request that feeds it.
    pub(crate) fn subscribe(&mut self, path: &str, callback: SnapshotCallback) -> (SubscriptionId, Frame) {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let syscall = if self.has_path(path) { frames::STORE_GET } else { frames::STORE_SUBSCRIBE };
        self.subscriptions
            .insert(id, LocalSubscription { path: path.to_owned(), callback: Rc::new(RefCell::new(callback)) });

        let frame = Frame::request(syscall).with_path(path);
        let read = PendingRead { subscription: id, path: path.to_owned(), seen_write: self.write_seq(path) };
        self.reads.insert(frame.id.clone(), read);
        (id, frame)
    }

    /// Drop a local subscriber. Returns the `store:unsubscribe` to send when
    /// it was the last one on its path.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Frame> {
        let path = self.forget(id)?;
        if self.has_path(&path) {
            return None;
        }
        Some(Frame::request(frames::STORE_UNSUBSCRIBE).with_path(path))
    }

    /// Drop a local subscriber without telling the server.
    pub(crate) fn forget(&mut self, id: SubscriptionId) -> Option<String> {
        let removed = self.subscriptions.remove(&id)?;
        self.reads.retain(|_, read| read.subscription != id);
        Some(removed.path)
    }

    /// Record a local write. Returns the `store:set` request and the local delivery.
    pub(crate) fn set(&mut self, path: &str, value: Value) -> (Frame, Delivery) {
        let value = frames::normalize_value(value);
        self.writes += 1;
        self.last_write.insert(path.to_owned(), self.writes);

        let frame = Frame::request(frames::STORE_SET)
            .with_path(path)
            .with_data(frames::FRAME_VALUE, value.clone().unwrap_or(Value::Null));
        (frame, Delivery { callbacks: self.callbacks_for(path), value })
    }

    /// Decide who, if anyone, receives the value an inbound frame carries.
    pub(crate) fn route(&mut self, frame: &Frame) -> Option<Delivery> {
        match (frame.syscall.as_str(), frame.status) {
            (frames::STORE_VALUE, Status::Request) => {
                let Some(path) = frame.path.as_deref() else {
                    warn!("store:value without path ignored");
                    return None;
                };
                Some(Delivery { callbacks: self.callbacks_for(path), value: frame.value().cloned() })
            }
            (frames::STORE_SUBSCRIBE | frames::STORE_GET, Status::Done) => {
                let read = self.take_read(frame)?;
                if self.write_seq(&read.path) > read.seen_write {
                    debug!(path = %read.path, "read reply predates a local write; dropped");
                    return None;
                }
                let subscription = self.subscriptions.get(&read.subscription)?;
                Some(Delivery { callbacks: vec![Rc::clone(&subscription.callback)], value: frame.value().cloned() })
            }
            (_, Status::Error) => {
                if frame.parent_id.as_ref().is_some_and(|id| self.reads.remove(id).is_some()) {
                    debug!(syscall = %frame.syscall, "pending read abandoned");
                }
                warn!(syscall = %frame.syscall, path = ?frame.path, message = frame.message().unwrap_or_default(), "store rejected request");
                None
            }
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, path: &str) -> usize {
        self.subscriptions.values().filter(|s| s.path == path).count()
    }

    fn take_read(&mut self, frame: &Frame) -> Option<PendingRead> {
        let parent = frame.parent_id.as_deref()?;
        let read = self.reads.remove(parent);
        if read.is_none() {
            debug!(parent, syscall = %frame.syscall, "reply for unknown read ignored");
        }
        read
    }

    fn has_path(&self, path: &str) -> bool {
        self.subscriptions.values().any(|s| s.path == path)
    }

    fn write_seq(&self, path: &str) -> u64 {
        self.last_write.get(path).copied().unwrap_or_default()
    }

    fn callbacks_for(&self, path: &str) -> Vec<SharedCallback> {
        self.subscriptions
            .values()
            .filter(|s| s.path == path)
            .map(|s| Rc::clone(&s.callback))
            .collect()
    }
}

// =============================================================================
// FRAME GATEWAY
// =============================================================================

/// Outbound half of a store connection.
pub trait Link {
    /// Send or queue one frame.
    ///
    /// # Errors
    ///
    /// Fails when the connection can no longer carry frames.
    fn send(&self, frame: &Frame) -> Result<(), GatewayError>;
}

/// Gateway speaking store frames over a [`Link`]. Clones share the connection.
#[derive(Clone)]
pub struct FrameGateway<L: Link> {
    router: Rc<RefCell<StoreRouter>>,
    link: L,
}

/// The browser gateway.
pub type WsGateway = FrameGateway<WsLink>;

impl<L: Link> FrameGateway<L> {
    pub fn new(link: L) -> Self {
        Self { router: Rc::new(RefCell::new(StoreRouter::default())), link }
    }

    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Hand one inbound frame to the local subscribers it is meant for.
    pub fn receive(&self, frame: &Frame) {
        let delivery = self.router.borrow_mut().route(frame);
        if let Some(delivery) = delivery {
            delivery.run();
        }
    }

    /// Decode and [`receive`](Self::receive) one text message.
    pub fn receive_text(&self, text: &str) {
        match frames::decode_frame(text) {
            Ok(frame) => self.receive(&frame),
            Err(e) => warn!(error = %e, "undecodable store frame"),
        }
    }
}

impl<L: Link> Gateway for FrameGateway<L> {
    fn subscribe(&self, path: &str, callback: SnapshotCallback) -> Result<SubscriptionId, GatewayError> {
        check_path(path)?;
        let (id, frame) = self.router.borrow_mut().subscribe(path, callback);
        if let Err(e) = self.link.send(&frame) {
            self.router.borrow_mut().forget(id);
            return Err(e);
        }
        debug!(path, id = id.0, syscall = %frame.syscall, "store subscription added");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let frame = self.router.borrow_mut().unsubscribe(id);
        if let Some(frame) = frame {
            if let Err(e) = self.link.send(&frame) {
                debug!(path = ?frame.path, error = %e, "unsubscribe not sent");
            }
        }
    }

    fn set(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        check_path(path)?;
        let (frame, delivery) = self.router.borrow_mut().set(path, value);
        self.link.send(&frame)?;
        delivery.run();
        Ok(())
    }
}

// =============================================================================
// BROWSER WEBSOCKET
// =============================================================================

struct WsShared {
    socket: WebSocket,
    open: bool,
    outbox: Vec<String>,
}

/// [`Link`] over a browser websocket, queueing frames until it opens.
#[derive(Clone)]
pub struct WsLink {
    shared: Rc<RefCell<WsShared>>,
}

impl Link for WsLink {
    fn send(&self, frame: &Frame) -> Result<(), GatewayError> {
        let text = frames::encode_frame(frame)?;
        let mut shared = self.shared.borrow_mut();
        if shared.open {
            return shared.socket.send_with_str(&text).map_err(|e| GatewayError::Transport(format!("{e:?}")));
        }
        match shared.socket.ready_state() {
            WebSocket::CONNECTING => {
                shared.outbox.push(text);
                Ok(())
            }
            _ => Err(GatewayError::Closed),
        }
    }
}

impl WsLink {
    fn flush_outbox(&self) {
        let mut shared = self.shared.borrow_mut();
        shared.open = true;
        let pending = std::mem::take(&mut shared.outbox);
        info!(queued = pending.len(), "store connection open");
        for text in pending {
            if let Err(e) = shared.socket.send_with_str(&text) {
                error!(error = ?e, "failed to send queued frame");
            }
        }
    }
}

impl FrameGateway<WsLink> {
    /// Open a websocket to `url` and install its handlers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the browser refuses the URL.
    pub fn connect(url: &str) -> Result<Self, GatewayError> {
        let socket = WebSocket::new(url).map_err(|e| GatewayError::Transport(format!("{e:?}")))?;
        let link = WsLink {
            shared: Rc::new(RefCell::new(WsShared { socket: socket.clone(), open: false, outbox: Vec::new() })),
        };
        let gateway = Self::new(link);
        gateway.install_handlers(&socket);
        info!(url, "store connection opening");
        Ok(gateway)
    }

    /// Close the socket. Later writes fail with [`GatewayError::Closed`].
    pub fn close(&self) {
        let mut shared = self.link.shared.borrow_mut();
        shared.open = false;
        shared.outbox.clear();
        if let Err(e) = shared.socket.close() {
            warn!(error = ?e, "failed to close store connection");
        }
    }

    fn install_handlers(&self, socket: &WebSocket) {
        let link = self.link.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_: Event| link.flush_outbox());
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let gateway = self.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| match event.data().as_string() {
            Some(text) => gateway.receive_text(&text),
            None => warn!("non-text store message ignored"),
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();

        let shared = Rc::clone(&self.link.shared);
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            shared.borrow_mut().open = false;
            warn!(code = event.code(), reason = %event.reason(), "store connection closed");
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();

        let onerror = Closure::<dyn FnMut(Event)>::new(move |_: Event| error!("store connection error"));
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }
}
