//! Process-wide `MessageListener`.
//!
//! Modeled as an atomic optional reference installed once at process
//! start and treated as immutable afterward — this exists purely for
//! tracing and must never gate core logic.

use std::sync::OnceLock;
use std::sync::Arc;

use crate::message::Opaque;
use crate::session::SessionId;

/// Tap for every wire send and receive, across all sessions. Implementations
/// must tolerate concurrent invocation from any session's task.
pub trait MessageListener: Send + Sync + 'static {
    fn on_send_message(&self, session_id: SessionId, wire: &Opaque);
    fn on_received_message(&self, session_id: SessionId, wire: &Opaque);
}

static MESSAGE_LISTENER: OnceLock<Arc<dyn MessageListener>> = OnceLock::new();

/// Install the process-wide listener. Only the first call takes effect;
/// later calls are silently ignored (matches the "immutable after first
/// use" contract).
pub fn install_message_listener(listener: Arc<dyn MessageListener>) {
    let _ = MESSAGE_LISTENER.set(listener);
}

/// Fetch the currently installed listener, if any.
pub fn message_listener() -> Option<Arc<dyn MessageListener>> {
    MESSAGE_LISTENER.get().cloned()
}
