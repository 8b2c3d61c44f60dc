//! Frame codec.
//!
//! `FrameCodec` is the capability a `JSONCommunicator`/`SOAPCommunicator`
//! subclass pair would otherwise provide by inheritance. Here it's an
//! injected, stateless capability — the
//! `Communicator` is generic over it rather than subclassed per transport
//! variant. `JsonFrameCodec` is the only implementation this crate ships;
//! it never validates action-specific payload shapes, it only builds and
//! parses the four-element envelopes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::CommunicatorError;
use crate::message::{Frame, Opaque};

/// Message-type tags from the OCPP-J wire format.
pub const MSG_TYPE_CALL: u8 = 2;
pub const MSG_TYPE_CALL_RESULT: u8 = 3;
pub const MSG_TYPE_CALL_ERROR: u8 = 4;

/// Envelope/pack/unpack capability injected into the Communicator.
///
/// Envelope builders (`make_call`, `make_call_result`, `make_call_error`,
/// `parse`) must be pure — no I/O — so they stay safe to reuse for logging
/// (e.g. a `MessageListener` wants to render the same wire value it sent).
pub trait FrameCodec: Send + Sync + 'static {
    /// Serialize an application payload into its wire fragment.
    fn pack<P: Serialize>(&self, payload: &P) -> Result<Opaque, CommunicatorError>;

    /// Deserialize a wire fragment back into an application payload.
    /// `type_tag` identifies the expected shape (e.g. the action name or
    /// "CallResult") purely for error messages — the schema itself lives
    /// outside this crate.
    fn unpack<P: DeserializeOwned>(
        &self,
        wire: &Opaque,
        type_tag: &str,
    ) -> Result<P, CommunicatorError>;

    fn make_call(&self, id: &str, action: &str, payload: Opaque) -> Opaque;
    fn make_call_result(&self, id: &str, payload: Opaque) -> Opaque;
    fn make_call_error(
        &self,
        id: &str,
        error_code: &str,
        error_description: &str,
        error_details: Opaque,
    ) -> Opaque;

    /// Parse a wire value into a tagged `Frame`. Never panics or returns an
    /// `Err` — malformed input becomes `Frame::Unparseable`.
    fn parse(&self, wire: &Value) -> Frame;
}

/// Default JSON-array codec for OCPP-J.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFrameCodec;

impl FrameCodec for JsonFrameCodec {
    fn pack<P: Serialize>(&self, payload: &P) -> Result<Opaque, CommunicatorError> {
        serde_json::to_value(payload).map_err(|e| CommunicatorError::Conversion(e.to_string()))
    }

    fn unpack<P: DeserializeOwned>(
        &self,
        wire: &Opaque,
        type_tag: &str,
    ) -> Result<P, CommunicatorError> {
        serde_json::from_value(wire.clone()).map_err(|e| {
            CommunicatorError::Conversion(format!("unpack failed for {type_tag}: {e}"))
        })
    }

    fn make_call(&self, id: &str, action: &str, payload: Opaque) -> Opaque {
        json!([MSG_TYPE_CALL, id, action, payload])
    }

    fn make_call_result(&self, id: &str, payload: Opaque) -> Opaque {
        json!([MSG_TYPE_CALL_RESULT, id, payload])
    }

    fn make_call_error(
        &self,
        id: &str,
        error_code: &str,
        error_description: &str,
        error_details: Opaque,
    ) -> Opaque {
        json!([MSG_TYPE_CALL_ERROR, id, error_code, error_description, error_details])
    }

    fn parse(&self, wire: &Value) -> Frame {
        let Some(array) = wire.as_array() else {
            return Frame::Unparseable;
        };
        let Some(type_id) = array.first().and_then(Value::as_u64) else {
            return Frame::Unparseable;
        };
        match type_id as u8 {
            MSG_TYPE_CALL => {
                let (Some(id), Some(action), payload) = (
                    array.get(1).and_then(Value::as_str),
                    array.get(2).and_then(Value::as_str),
                    array.get(3).cloned().unwrap_or(Value::Null),
                ) else {
                    return Frame::Unparseable;
                };
                Frame::Call {
                    id: id.to_string(),
                    action: action.to_string(),
                    payload,
                }
            }
            MSG_TYPE_CALL_RESULT => {
                let Some(id) = array.get(1).and_then(Value::as_str) else {
                    return Frame::Unparseable;
                };
                Frame::CallResult {
                    id: id.to_string(),
                    payload: array.get(2).cloned().unwrap_or(Value::Null),
                }
            }
            MSG_TYPE_CALL_ERROR => {
                let (Some(id), Some(code), Some(desc)) = (
                    array.get(1).and_then(Value::as_str),
                    array.get(2).and_then(Value::as_str),
                    array.get(3).and_then(Value::as_str),
                ) else {
                    return Frame::Unparseable;
                };
                Frame::CallError {
                    id: id.to_string(),
                    error_code: code.to_string(),
                    error_description: desc.to_string(),
                    raw_payload: array.get(4).cloned().unwrap_or(Value::Null),
                }
            }
            _ => Frame::Unparseable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Heartbeat {}

    #[test]
    fn roundtrip_call() {
        let codec = JsonFrameCodec;
        let payload = codec.pack(&Heartbeat {}).unwrap();
        let wire = codec.make_call("abc", "Heartbeat", payload);
        assert_eq!(
            codec.parse(&wire),
            Frame::Call {
                id: "abc".into(),
                action: "Heartbeat".into(),
                payload: json!({}),
            }
        );
    }

    #[test]
    fn roundtrip_call_result() {
        let codec = JsonFrameCodec;
        let wire = codec.make_call_result("abc", json!({"currentTime": "2024-01-01T00:00:00Z"}));
        assert_eq!(
            codec.parse(&wire),
            Frame::CallResult {
                id: "abc".into(),
                payload: json!({"currentTime": "2024-01-01T00:00:00Z"}),
            }
        );
    }

    #[test]
    fn roundtrip_call_error() {
        let codec = JsonFrameCodec;
        let wire = codec.make_call_error("t1", "GenericError", "boom", json!({}));
        assert_eq!(
            codec.parse(&wire),
            Frame::CallError {
                id: "t1".into(),
                error_code: "GenericError".into(),
                error_description: "boom".into(),
                raw_payload: json!({}),
            }
        );
    }

    #[test]
    fn malformed_is_unparseable() {
        let codec = JsonFrameCodec;
        assert_eq!(codec.parse(&json!({"not": "an array"})), Frame::Unparseable);
        assert_eq!(codec.parse(&json!([99, "x"])), Frame::Unparseable);
        assert_eq!(codec.parse(&json!([2, "x"])), Frame::Unparseable);
    }
}
