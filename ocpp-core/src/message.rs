//! OCPP-J wire message shapes.
//!
//! A `Frame` is the parsed form of one of the four wire variants. The
//! payload type is kept opaque (`serde_json::Value`) — the core never
//! inspects action-specific shapes, that's the job of the feature/action
//! schema the engine is built to sit underneath.

use serde_json::Value;

/// Opaque payload carried by a frame. The core treats this as data;
/// only the codec's generic `pack`/`unpack` touch the concrete request
/// and response types an application defines.
pub type Opaque = Value;

/// The four OCPP-J wire shapes, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call {
        id: String,
        action: String,
        payload: Opaque,
    },
    CallResult {
        id: String,
        payload: Opaque,
    },
    CallError {
        id: String,
        error_code: String,
        error_description: String,
        raw_payload: Opaque,
    },
    /// Parsed but didn't match any known shape. Never produced by failure
    /// to deserialize JSON at all — that's a transport-level concern.
    Unparseable,
}

impl Frame {
    /// Correlation id carried by this frame, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Frame::Call { id, .. } | Frame::CallResult { id, .. } | Frame::CallError { id, .. } => {
                Some(id)
            }
            Frame::Unparseable => None,
        }
    }
}
