//! Transport abstraction and the application-facing event
//! traits it's built around.
//!
//! `Radio` is the uniform surface the Communicator drives; whether the
//! bytes actually move over an accepted server-side socket
//! (`ocpp-listener`) or a dialed client-side socket (`ocpp-client`) is
//! invisible here.

use async_trait::async_trait;

use crate::error::CommunicatorError;
use crate::message::Opaque;

/// Uniform send/receive/close surface over a WebSocket, client or
/// server side.
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Send a wire fragment. The only failure mode the Communicator
    /// needs to distinguish is "not connected" — anything else the
    /// transport wants to report is out of scope for this trait.
    async fn send(&self, wire: Opaque) -> Result<(), CommunicatorError>;

    fn disconnect(&self);

    fn is_closed(&self) -> bool;
}

/// Callbacks a transport fires into the Communicator's inbound
/// dispatcher. Implemented once, in this crate, as the
/// `TransportEventsAdapter`; transports only need to call it.
#[async_trait]
pub trait TransportEvents: Send + Sync + 'static {
    async fn connected(&self);
    async fn disconnected(&self);
    async fn received_message(&self, wire: Opaque);
}

/// Application-facing event sink for a single session.
#[async_trait]
pub trait CommunicatorEvents: Send + Sync + 'static {
    async fn on_connected(&self) {}
    async fn on_disconnected(&self) {}
    async fn on_call(&self, id: &str, action: &str, payload: Opaque);
    async fn on_call_result(&self, id: &str, action: &str, payload: Opaque);
    async fn on_error(&self, id: &str, code: &str, description: &str, context: Opaque);
}

/// An outgoing `CallResult` payload whose completion the application may
/// want to hook — e.g. to release a resource once the confirmation has
/// actually gone out over the wire.
///
/// The default no-op impl covers the common case of a plain serializable
/// payload with nothing to run afterward.
pub trait Confirmation: serde::Serialize + Send + Sync {
    fn on_completed(&self) -> Result<(), String> {
        Ok(())
    }
}

/// External predicate classifying an action as transaction-related.
/// Injected rather than hard-coded — the action/feature schema is an
/// external collaborator, not something this crate owns.
pub type TransactionClassifier = std::sync::Arc<dyn Fn(&str) -> bool + Send + Sync>;
