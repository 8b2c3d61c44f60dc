//! Server-side `Radio`: a `Communicator`'s view of one accepted socket.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex as AsyncMutex;

use ocpp_core::{CommunicatorError, Opaque, Radio};

/// Wraps the write half of an accepted socket. Serializing sends behind
/// a mutex is the usual `Arc<Mutex<SplitSink<WebSocket, Message>>>`
/// pattern for a split axum socket.
pub struct AxumReceiver {
    sink: AsyncMutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl AxumReceiver {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Arc<Self> {
        Arc::new(Self {
            sink: AsyncMutex::new(sink),
            closed: AtomicBool::new(false),
        })
    }

    /// Close with a specific WebSocket close code — used for the
    /// health-check sentinel as well as ordinary
    /// shutdown.
    pub async fn close_with_code(&self, code: u16, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let frame = axum::extract::ws::CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let mut guard = self.sink.lock().await;
        let _ = guard.send(Message::Close(Some(frame))).await;
    }

    /// Send a WebSocket ping. Used by the connection-lost timeout to
    /// probe liveness; a reply arrives as an ordinary `Message::Pong`
    /// on the read half, observed by the caller's own receive loop.
    pub async fn ping(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let mut guard = self.sink.lock().await;
        guard.send(Message::Ping(Vec::new().into())).await.is_ok()
    }
}

#[async_trait]
impl Radio for AxumReceiver {
    async fn send(&self, wire: Opaque) -> Result<(), CommunicatorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CommunicatorError::NotConnected);
        }
        let text = serde_json::to_string(&wire)
            .map_err(|e| CommunicatorError::Conversion(e.to_string()))?;
        let mut guard = self.sink.lock().await;
        guard
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| CommunicatorError::NotConnected)
    }

    fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
