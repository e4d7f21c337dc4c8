//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the store semantics and disk persistence so the
//! route handler can stay focused on frame translation.

pub mod persistence;
pub mod store;
