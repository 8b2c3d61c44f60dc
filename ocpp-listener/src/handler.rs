//! Application-facing traits the binding crate implements.
//!
//! A `SessionFactory` (builds a communicator-variant session) and a
//! notification/auth `handler` are sometimes kept as two distinct
//! collaborators so a system can abstract over JSON vs SOAP
//! communicator construction. SOAP isn't carried here, so there is
//! only ever one way to build a session; the two collapse into a
//! single `ListenerHandler` (see DESIGN.md).

use std::sync::Arc;

use async_trait::async_trait;

use ocpp_core::{Communicator, CommunicatorEvents, JsonFrameCodec, SessionInformation};

use crate::error::ListenerError;

/// Implemented once by the embedding application.
#[async_trait]
pub trait ListenerHandler: Send + Sync + 'static {
    /// Accept or reject a handshake. Password-length bounds are already
    /// enforced by the Listener before this is called; `user`/`pass`
    /// are `None` when no `Authorization` header was sent at all.
    async fn authenticate_session(
        &self,
        info: &SessionInformation,
        user: Option<&str>,
        pass: Option<&str>,
    ) -> Result<(), ListenerError>;

    /// Called once per accepted session, after the Communicator exists
    /// and has been handed its `SessionId`, to obtain the event sink
    /// that will receive `onConnected`/`onCall`/... for this session.
    async fn new_session(
        &self,
        comm: Arc<Communicator<JsonFrameCodec>>,
        info: &SessionInformation,
    ) -> Arc<dyn CommunicatorEvents>;
}
