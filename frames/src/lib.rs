//! Shared frame model and JSON codec for the realtime store transport.
//!
//! This crate owns the wire representation spoken by the store server, the
//! browser gateway in `canvas`, and the command line client. Payloads stay
//! flexible (`serde_json::Value`) because the store never interprets the
//! values it holds; only the `canvas` crate knows what a drawing looks like.


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// SYSCALLS AND FIELDS
// =============================================================================

/// Subscribe to every change of the value at `path`.
pub const STORE_SUBSCRIBE: &str = "store:subscribe";
/// Stop receiving changes for `path`.
pub const STORE_UNSUBSCRIBE: &str = "store:unsubscribe";
/// One-shot read of the value at `path`.
pub const STORE_GET: &str = "store:get";
/// Overwrite the whole value at `path`.
pub const STORE_SET: &str = "store:set";
/// Server push carrying the current value at `path`.
pub const STORE_VALUE: &str = "store:value";

/// Frame data key for the stored value.
pub const FRAME_VALUE: &str = "value";
/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";
/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";
/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

/// Longest accepted store path, in bytes.
pub const MAX_PATH_LEN: usize = 256;

// =============================================================================
// TYPES
// =============================================================================

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not a JSON frame.
    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// The frame carries a syscall that is empty.
    #[error("frame has an empty syscall")]
    EmptySyscall,
}

/// Lifecycle position of a frame in a request/response exchange.
///
/// Every exchange is `request → item* → done` or `request → error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Request sent by a client, or an unsolicited server push.
    Request,
    /// Intermediate streaming item (non-terminal).
    Item,
    /// Successful terminal response.
    Done,
    /// Error terminal response.
    Error,
}

impl Status {
    /// Terminal statuses end a response stream.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// ID of the request frame this is responding to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Store path this frame is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Namespaced operation name, e.g. `"store:set"`.
    pub syscall: String,
    /// Lifecycle position of the frame.
    pub status: Status,
    /// Flat JSON object payload.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Create a request frame. Entry point for every syscall.
    pub fn request(syscall: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            path: None,
            syscall: syscall.into(),
            status: Status::Request,
            data: Map::new(),
        }
    }

    /// Create an item response carrying one result.
    #[must_use]
    pub fn item(&self, data: Map<String, Value>) -> Self {
        self.reply(Status::Item, data)
    }

    /// Create an empty done response. Terminal.
    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Map::new())
    }

    /// Create a done response carrying a payload. Terminal.
    #[must_use]
    pub fn done_with(&self, data: Map<String, Value>) -> Self {
        self.reply(Status::Done, data)
    }

    /// Create an error response from a plain string. Terminal.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(FRAME_MESSAGE.into(), Value::String(message.into()));
        self.reply(Status::Error, data)
    }

    /// Create a structured error response from a typed error. Terminal.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Map::new();
        data.insert(FRAME_CODE.into(), Value::String(err.error_code().to_string()));
        data.insert(FRAME_MESSAGE.into(), Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), Value::Bool(err.retryable()));
        self.reply(Status::Error, data)
    }

    /// Build a reply frame. Inherits `parent_id`, `path`, and `syscall`.
    fn reply(&self, status: Status, data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: Some(self.id.clone()),
            path: self.path.clone(),
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }
}

// =============================================================================
// BUILDERS AND ACCESSORS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// The `value` payload, if the frame carries one. JSON `null` counts as absent.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.data.get(FRAME_VALUE).filter(|v| !v.is_null())
    }

    /// The error message of an error frame, if present.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.data.get(FRAME_MESSAGE).and_then(Value::as_str)
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a frame as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] only if a payload value cannot be
/// represented as JSON, which does not happen for values built from JSON.
pub fn encode_frame(frame: &Frame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode JSON text into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed text and
/// [`CodecError::EmptySyscall`] when the syscall is blank.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    let frame: Frame = serde_json::from_str(text)?;
    if frame.syscall.trim().is_empty() {
        return Err(CodecError::EmptySyscall);
    }
    Ok(frame)
}

/// Whether `path` is an acceptable store path.
///
/// Paths are `/`-separated segments of ASCII letters, digits, `_` and `-`,
/// with no empty segments.
#[must_use]
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.len() <= MAX_PATH_LEN
        && path.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        })
}

/// Normalize a value for storage. `null`, empty lists and empty objects mean
/// "nothing stored" and come back as `None`.
#[must_use]
pub fn normalize_value(value: Value) -> Option<Value> {
    match &value {
        Value::Null => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}
