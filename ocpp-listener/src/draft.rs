//! Malformed-frame diagnostics.
//!
//! `tokio_tungstenite`'s frame reader (underneath axum's `WebSocket`)
//! already handles RFC 6455 framing; there is no `Draft` class to
//! extend in this stack. Surviving a failed translation with the
//! original bytes still available for a hex dump is reproduced at the
//! one layer where it's still observable: decoding a text frame's
//! payload into an OCPP-J wire value. `decode` tees the buffer before
//! attempting the parse, so a failure can log the original bytes
//! regardless of what `serde_json`
//! consumed internally.

use tracing::debug;

/// Parse one text frame's bytes into a wire JSON value. Returns `None`
/// (the `Frame::Unparseable` sentinel, one layer up) on any failure,
/// after logging the original bytes as hex at debug. Never panics.
pub fn decode(bytes: &[u8]) -> Option<serde_json::Value> {
    let tee = bytes.to_vec();
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(hex = %hex_dump(&tee), error = %e, "malformed OCPP-J frame");
            None
        }
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_json_decodes() {
        assert_eq!(decode(br#"[2,"abc","Heartbeat",{}]"#), Some(serde_json::json!([2, "abc", "Heartbeat", {}])));
    }

    #[test]
    fn malformed_bytes_yield_none_not_panic() {
        assert_eq!(decode(&[0x81, 0x7e, 0xff, 0xff, 0x00]), None);
    }

    #[test]
    fn hex_dump_matches_expected_form() {
        assert_eq!(hex_dump(&[0x81, 0x7e, 0xff, 0xff, 0x00]), "817effff00");
    }
}
