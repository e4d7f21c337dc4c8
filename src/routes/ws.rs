//! WebSocket handler: store frames in, replies and pushes out.
//!
//! DESIGN
//! ======
//! Each upgraded socket gets a fresh client ID and one `select!` loop over:
//! - Incoming client frames → parse + dispatch by syscall
//! - `store:value` pushes queued by other writers → forward to client
//!
//! Handler functions validate, touch the store, and return an `Outcome`.
//! The dispatch layer turns that into the reply sent back to the requester.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → allocate a bounded outbound queue
//! 2. Client sends frames → dispatch → handler returns Outcome → reply
//! 3. Writes from other clients arrive through the queue as `store:value`
//! 4. Close → release every subscription the client held

use std::collections::HashSet;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use frames::{Frame, Status};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::store::{self, StoreError};
use crate::state::AppState;

const GATEWAY_ERROR: &str = "gateway:error";

// =============================================================================
// OUTCOME
// =============================================================================

/// What a store handler produced. Turned into the reply frame by
/// `process_inbound_text`; handlers never touch the socket.
enum Outcome {
    /// `done` carrying a payload.
    Reply(Map<String, Value>),
    /// `done` with an empty payload.
    Done,
}

#[derive(Clone, Copy)]
enum StoreOp {
    Subscribe,
    Unsubscribe,
    Get,
    Set,
}

impl StoreOp {
    fn parse(syscall: &str) -> Option<Self> {
        match syscall {
            frames::STORE_SUBSCRIBE => Some(Self::Subscribe),
            frames::STORE_UNSUBSCRIBE => Some(Self::Unsubscribe),
            frames::STORE_GET => Some(Self::Get),
            frames::STORE_SET => Some(Self::Set),
            _ => None,
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for store:value pushes from writers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.client_queue);

    // Paths this client is subscribed to, released on disconnect.
    let mut subscriptions: HashSet<String> = HashSet::new();

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut subscriptions, client_id, &client_tx, text.as_str()).await;
                        if send_frames(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Binary(_) => debug!(%client_id, "ws: binary message ignored"),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    store::unsubscribe_all(&state, client_id, &subscriptions).await;
    info!(%client_id, subscriptions = subscriptions.len(), "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode one text message and produce the frames owed to its sender.
///
/// Kept apart from the socket so tests can drive dispatch with plain channels.
async fn process_inbound_text(
    state: &AppState,
    subscriptions: &mut HashSet<String>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let req = match frames::decode_frame(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let mut err = Frame::request(GATEWAY_ERROR).with_data(frames::FRAME_MESSAGE, format!("invalid frame: {e}"));
            err.status = Status::Error;
            return vec![err];
        }
    };

    info!(%client_id, id = %req.id, syscall = %req.syscall, path = ?req.path, "ws: recv frame");

    if req.status != Status::Request {
        return vec![req.error(format!("expected a request, got {:?}", req.status))];
    }

    match handle_store(state, subscriptions, client_id, client_tx, &req).await {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// STORE HANDLERS
// =============================================================================

async fn handle_store(
    state: &AppState,
    subscriptions: &mut HashSet<String>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(op) = StoreOp::parse(&req.syscall) else {
        return Err(req.error_from(&StoreError::UnknownSyscall(req.syscall.clone())));
    };
    let path = store::require_path(req.path.as_deref()).map_err(|e| req.error_from(&e))?;

    match op {
        StoreOp::Subscribe => {
            let value = store::subscribe(state, path, client_id, client_tx.clone()).await;
            subscriptions.insert(path.to_owned());
            Ok(Outcome::Reply(value_data(value)))
        }
        StoreOp::Unsubscribe => {
            store::unsubscribe(state, path, client_id).await;
            subscriptions.remove(path);
            Ok(Outcome::Done)
        }
        StoreOp::Get => Ok(Outcome::Reply(value_data(store::get(state, path).await))),
        StoreOp::Set => {
            let value = req.data.get(frames::FRAME_VALUE).cloned().unwrap_or(Value::Null);
            let version = store::set(state, path, value, Some(client_id)).await;
            let mut data = Map::new();
            data.insert("version".into(), Value::from(version));
            Ok(Outcome::Reply(data))
        }
    }
}

fn value_data(value: Option<Value>) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(frames::FRAME_VALUE.into(), value.unwrap_or(Value::Null));
    data
}

// =============================================================================
// SEND
// =============================================================================

async fn send_frames(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), ()> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match frames::encode_frame(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get(frames::FRAME_CODE).and_then(Value::as_str).unwrap_or("-");
        let message = frame.message().unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
