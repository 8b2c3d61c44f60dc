//! The per-session message pump.
//!
//! One `Communicator` per `Session`. Outgoing sends are serialized on an
//! async mutex (so FIFO per caller holds even across awaits); the
//! transaction-related offline queue and its `RetryRunner` are optional,
//! enabled at construction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::error::CommunicatorError;
use crate::listener_hook::message_listener;
use crate::message::{Frame, Opaque};
use crate::queue::OfflineQueue;
use crate::radio::{CommunicatorEvents, Confirmation, Radio, TransactionClassifier, TransportEvents};
use crate::retry::RetryRunner;
use crate::session::SessionId;

/// Per-session message framing, correlation and retry engine.
///
/// Generic over the injected [`FrameCodec`] rather than subclassed per
/// transport variant.
pub struct Communicator<C: FrameCodec> {
    codec: C,
    radio: Arc<dyn Radio>,
    /// Bound via [`Self::bind_events`] — deferred rather than taken by
    /// `new` so a `ListenerHandler` can receive the already-constructed
    /// Communicator and hand back an events sink built from it, without
    /// a cyclic reference.
    events: OnceLock<Arc<dyn CommunicatorEvents>>,
    transaction_related: TransactionClassifier,

    session_id: Arc<OnceLock<SessionId>>,

    /// Serializes the outgoing send path per session.
    send_lock: AsyncMutex<()>,

    queue: Option<Arc<OfflineQueue>>,
    retry: Option<RetryRunner>,
    failed_flag: Arc<AtomicBool>,

    /// id -> action for calls awaiting a reply, so `onCallResult` can
    /// carry the action even though the wire form doesn't.
    pending: Mutex<HashMap<String, String>>,
}

impl<C: FrameCodec> Communicator<C> {
    /// Construct a Communicator already bound to a connected/accepted
    /// `Radio`. The transport-specific "connect" (client dial) or
    /// "accept" (server handshake) step happens in the binding crate
    /// before this is called; by the time a Communicator exists, its
    /// Radio is live.
    pub fn new(
        codec: C,
        radio: Arc<dyn Radio>,
        transaction_related: TransactionClassifier,
        queue_enabled: bool,
    ) -> Arc<Self> {
        let failed_flag = Arc::new(AtomicBool::new(false));
        let queue = queue_enabled.then(|| Arc::new(OfflineQueue::new()));
        let session_id = Arc::new(OnceLock::new());

        // The RetryRunner only needs the queue, the radio and the shared
        // failed_flag — it has no back-reference to the Communicator, so
        // it can be spawned right here without an `Arc<Self>` in hand yet.
        let retry = queue.as_ref().map(|q| {
            RetryRunner::spawn(
                Arc::clone(&session_id),
                Arc::clone(q),
                Arc::clone(&radio),
                Arc::clone(&failed_flag),
            )
        });

        Arc::new(Self {
            codec,
            radio,
            events: OnceLock::new(),
            transaction_related,
            session_id,
            send_lock: AsyncMutex::new(()),
            queue,
            retry,
            failed_flag,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Bind the application-facing event sink. Must be called before any
    /// inbound dispatch or outgoing send reaches this Communicator — the
    /// transport bindings in `ocpp-listener`/`ocpp-client` do this before
    /// starting the per-socket message loop. Idempotent: later calls are
    /// ignored.
    pub fn bind_events(&self, events: Arc<dyn CommunicatorEvents>) {
        let _ = self.events.set(events);
    }

    fn events(&self) -> &Arc<dyn CommunicatorEvents> {
        self.events
            .get()
            .expect("Communicator used before bind_events was called")
    }

    /// Install the session id once it's known (idempotent — later calls
    /// are ignored, matching the source's setter semantics).
    pub fn set_session_id(&self, id: SessionId) {
        let _ = self.session_id.set(id);
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.get().copied()
    }

    fn notify_message_listener_send(&self, wire: &Opaque) {
        if let Some(ml) = message_listener() {
            if let Some(id) = self.session_id() {
                ml.on_send_message(id, wire);
            }
        }
    }

    /// Kick the RetryRunner, if the offline queue is enabled for this
    /// session.
    fn kick_retry(&self) {
        if let Some(retry) = &self.retry {
            retry.kick();
        }
    }

    // -----------------------------------------------------------------
    // connect/accept
    // -----------------------------------------------------------------

    /// Fire `onConnected`, then kick the RetryRunner.
    pub async fn notify_connected(&self) {
        self.events().on_connected().await;
        self.kick_retry();
    }

    pub async fn notify_disconnected(&self) {
        self.events().on_disconnected().await;
    }

    // -----------------------------------------------------------------
    // sendCall
    // -----------------------------------------------------------------

    pub async fn send_call<P: Serialize>(
        &self,
        id: &str,
        action: &str,
        request: &P,
    ) -> Result<(), CommunicatorError> {
        let payload = match self.codec.pack(request) {
            Ok(p) => p,
            Err(e) => {
                self.events()
                    .on_error(id, e.ocpp_code(), &e.to_string(), serde_json::Value::Null)
                    .await;
                return Err(e);
            }
        };
        let wire = self.codec.make_call(id, action, payload.clone());
        let transactional = (self.transaction_related)(action);

        let _guard = self.send_lock.lock().await;

        if self.radio.is_closed() {
            return self.offline_or_error(id, transactional, wire, payload).await;
        }

        if transactional {
            if let Some(queue) = &self.queue {
                if !queue.is_empty() {
                    queue.push_back(wire);
                    self.pending
                        .lock()
                        .unwrap()
                        .insert(id.to_string(), action.to_string());
                    self.kick_retry();
                    return Ok(());
                }
            }
        }

        match self.radio.send(wire.clone()).await {
            Ok(()) => {
                self.pending
                    .lock()
                    .unwrap()
                    .insert(id.to_string(), action.to_string());
                self.notify_message_listener_send(&wire);
                Ok(())
            }
            Err(CommunicatorError::NotConnected) => {
                self.offline_or_error(id, transactional, wire, payload).await
            }
            Err(e) => Err(e),
        }
    }

    async fn offline_or_error(
        &self,
        id: &str,
        transactional: bool,
        wire: Opaque,
        context: Opaque,
    ) -> Result<(), CommunicatorError> {
        if transactional {
            if let Some(queue) = &self.queue {
                queue.push_back(wire);
                return Ok(());
            }
        }
        self.events()
            .on_error(id, "Not connected", "transport is not connected", context)
            .await;
        Ok(())
    }

    // -----------------------------------------------------------------
    // sendCallResult
    // -----------------------------------------------------------------

    pub async fn send_call_result<P: Confirmation>(
        &self,
        id: &str,
        action: &str,
        confirmation: &P,
    ) -> Result<(), CommunicatorError> {
        let payload = match self.codec.pack(confirmation) {
            Ok(p) => p,
            Err(e) => {
                // A packing failure never crashes the dispatcher — it
                // becomes a CallError back to the peer instead.
                return self
                    .send_call_error(id, action, e.ocpp_code(), &e.to_string())
                    .await;
            }
        };
        let wire = self.codec.make_call_result(id, payload.clone());

        let _guard = self.send_lock.lock().await;

        if self.radio.is_closed() {
            self.events()
                .on_error(id, "Not connected", "transport is not connected", payload)
                .await;
            return Ok(());
        }

        match self.radio.send(wire.clone()).await {
            Ok(()) => self.notify_message_listener_send(&wire),
            Err(_) => {
                self.events()
                    .on_error(id, "Not connected", "transport is not connected", payload)
                    .await;
                return Ok(());
            }
        }

        if let Err(e) = confirmation.on_completed() {
            self.events()
                .on_error(id, "ConfirmationCompletedHandlerFailed", &e, serde_json::Value::Null)
                .await;
        }

        Ok(())
    }

    // -----------------------------------------------------------------
    // sendCallError
    // -----------------------------------------------------------------

    pub async fn send_call_error(
        &self,
        id: &str,
        _action: &str,
        code: &str,
        description: &str,
    ) -> Result<(), CommunicatorError> {
        let wire = self
            .codec
            .make_call_error(id, code, description, serde_json::Value::Null);

        let _guard = self.send_lock.lock().await;

        if self.radio.is_closed() {
            self.events()
                .on_error(id, "Not connected", "transport is not connected", serde_json::Value::Null)
                .await;
            return Ok(());
        }

        match self.radio.send(wire.clone()).await {
            Ok(()) => {
                self.notify_message_listener_send(&wire);
                Ok(())
            }
            Err(_) => {
                self.events()
                    .on_error(id, "Not connected", "transport is not connected", serde_json::Value::Null)
                    .await;
                Ok(())
            }
        }
    }

    pub fn disconnect(&self) {
        self.radio.disconnect();
    }

    // -----------------------------------------------------------------
    // inbound dispatch
    // -----------------------------------------------------------------

    pub async fn handle_wire(&self, wire: Opaque) {
        if let Some(ml) = message_listener() {
            if let Some(id) = self.session_id() {
                ml.on_received_message(id, &wire);
            }
        }

        match self.codec.parse(&wire) {
            Frame::CallResult { id, payload } => {
                self.failed_flag.store(false, Ordering::SeqCst);
                let action = self
                    .pending
                    .lock()
                    .unwrap()
                    .remove(&id)
                    .unwrap_or_default();
                self.events().on_call_result(&id, &action, payload).await;
            }
            Frame::CallError {
                id,
                error_code,
                error_description,
                raw_payload,
            } => {
                self.failed_flag.store(true, Ordering::SeqCst);
                self.pending.lock().unwrap().remove(&id);
                self.events()
                    .on_error(&id, &error_code, &error_description, raw_payload)
                    .await;
            }
            Frame::Call { id, action, payload } => {
                self.events().on_call(&id, &action, payload).await;
            }
            Frame::Unparseable => {
                debug!("received unparseable OCPP-J frame");
            }
        }
    }

    /// Unpack a received payload into a typed request/response —
    /// exposed so application-level dispatch built on top of `on_call`/
    /// `on_call_result` can reuse the injected codec.
    pub fn unpack<P: DeserializeOwned>(
        &self,
        wire: &Opaque,
        type_tag: &str,
    ) -> Result<P, CommunicatorError> {
        self.codec.unpack(wire, type_tag)
    }

    pub fn failed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.failed_flag)
    }

    pub fn queue(&self) -> Option<Arc<OfflineQueue>> {
        self.queue.clone()
    }

    pub fn radio(&self) -> Arc<dyn Radio> {
        Arc::clone(&self.radio)
    }
}

/// Bridges `Radio`/transport callbacks into a Communicator's inbound
/// dispatch. Holds a weak reference so the transport and
/// the Communicator don't keep each other alive.
pub struct TransportEventsAdapter<C: FrameCodec> {
    comm: std::sync::Weak<Communicator<C>>,
}

impl<C: FrameCodec> TransportEventsAdapter<C> {
    pub fn new(comm: &Arc<Communicator<C>>) -> Self {
        Self {
            comm: Arc::downgrade(comm),
        }
    }
}

#[async_trait::async_trait]
impl<C: FrameCodec> TransportEvents for TransportEventsAdapter<C> {
    async fn connected(&self) {
        if let Some(comm) = self.comm.upgrade() {
            comm.notify_connected().await;
        } else {
            warn!("transport connected event dropped: Communicator gone");
        }
    }

    async fn disconnected(&self) {
        if let Some(comm) = self.comm.upgrade() {
            comm.notify_disconnected().await;
        }
    }

    async fn received_message(&self, wire: Opaque) {
        if let Some(comm) = self.comm.upgrade() {
            comm.handle_wire(wire).await;
        }
    }
}
