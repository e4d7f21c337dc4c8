//! Drawing engine for the shared sketch board.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It turns
//! raw mouse and touch events into strokes, keeps the local drawing in step
//! with the store over a websocket, and paints the drawing over a fixed
//! background image. The host page only wires DOM events and controls to
//! [`engine::Engine`]. Everything except `dom`, the websocket half of `net`
//! and the browser half of `engine` is plain Rust and runs natively, which is how the command line
//! client reuses the snapshot codec and the SVG export.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Browser [`engine::Engine`] and the testable [`engine::EngineCore`] |
//! | [`board`] | Binds an engine to a gateway path: persist on release, mirror remote snapshots |
//! | [`doc`] | Strokes, drawings and the snapshot wire format |
//! | [`coords`] | Pointer input and client-to-canvas coordinate mapping |
//! | [`input`] | Color swatches, stroke style and the gesture state |
//! | [`gateway`] | Gateway trait and the in-memory implementation |
//! | [`net`] | Websocket gateway speaking store frames |
//! | [`render`] | Canvas 2D drawing and SVG export |
//! | [`dom`] | DOM event and element adapters |
//! | [`consts`] | Defaults: store path, stroke style, background image |

pub mod board;
pub mod consts;
pub mod coords;
pub mod doc;
pub mod dom;
pub mod engine;
pub mod gateway;
pub mod input;
pub mod net;
pub mod render;
