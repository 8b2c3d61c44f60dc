//! Client-side `Radio` over `tokio_tungstenite`.
//!
//! A split sink/stream pair plus a background task owning the read
//! half — the common shape for a `ws_task` — but not its usual
//! reconnect policy: a client task like this one often loops forever
//! with exponential backoff built in. This engine's Communicator does
//! not reconnect on its own; `connect()` makes one attempt and
//! returns, and the embedding application decides if/when to call it
//! again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message as TMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use ocpp_core::{Communicator, CommunicatorError, FrameCodec, Opaque, Radio, TransportEventsAdapter};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = SplitSink<WsStream, TMessage>;

/// A `Radio` that dials out. Starts disconnected; `send` before the
/// first successful `connect` reports `NotConnected`, same as any
/// other closed radio (so a Communicator built around one before
/// connecting behaves exactly per the Communicator's offline rules).
pub struct WsTransmitter {
    sink: Arc<AsyncMutex<Option<Sink>>>,
    closed: Arc<AtomicBool>,
}

impl WsTransmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Arc::new(AsyncMutex::new(None)),
            closed: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Dial `uri`, and on success spawn the background read pump that
    /// feeds a `TransportEventsAdapter` bound to `comm`. A
    /// `Weak` reference inside the adapter means this task naturally
    /// stops delivering once the Communicator is dropped, without the
    /// task needing to be told to stop explicitly.
    pub async fn connect<C: FrameCodec>(
        &self,
        uri: &str,
        comm: &Arc<Communicator<C>>,
    ) -> Result<(), CommunicatorError> {
        let (stream, _response) = tokio_tungstenite::connect_async(uri)
            .await
            .map_err(|e| CommunicatorError::Conversion(e.to_string()))?;

        let (sink, mut read) = stream.split();
        *self.sink.lock().await = Some(sink);
        self.closed.store(false, Ordering::SeqCst);

        let adapter = TransportEventsAdapter::new(comm);
        let closed = Arc::clone(&self.closed);
        let sink_slot = Arc::clone(&self.sink);

        tokio::spawn(async move {
            adapter.connected().await;

            while let Some(msg) = read.next().await {
                match msg {
                    Ok(TMessage::Text(text)) => {
                        if let Some(value) = decode(text.as_bytes()) {
                            adapter.received_message(value).await;
                        }
                    }
                    Ok(TMessage::Close(_)) => break,
                    Ok(TMessage::Ping(_)) | Ok(TMessage::Pong(_)) => {}
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "ws recv error");
                        break;
                    }
                }
            }

            closed.store(true, Ordering::SeqCst);
            *sink_slot.lock().await = None;
            adapter.disconnected().await;
        });

        Ok(())
    }
}

#[async_trait::async_trait]
impl Radio for WsTransmitter {
    async fn send(&self, wire: Opaque) -> Result<(), CommunicatorError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(CommunicatorError::NotConnected)?;
        let text = serde_json::to_string(&wire)
            .map_err(|e| CommunicatorError::Conversion(e.to_string()))?;
        sink.send(TMessage::Text(text.into()))
            .await
            .map_err(|_| CommunicatorError::NotConnected)
    }

    fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Some(mut s) = sink.lock().await.take() {
                let _ = s.send(TMessage::Close(None)).await;
            }
        });
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Decode a received text frame, logging the original bytes as hex at
/// debug on failure.
fn decode(bytes: &[u8]) -> Option<serde_json::Value> {
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

    #[tokio::test]
    async fn send_before_connect_reports_not_connected() {
        let radio = WsTransmitter::new();
        let err = radio.send(serde_json::json!([2, "x", "Heartbeat", {}])).await;
        assert!(matches!(err, Err(CommunicatorError::NotConnected)));
        assert!(radio.is_closed());
    }

    #[test]
    fn malformed_text_yields_none() {
        assert_eq!(decode(b"not json"), None);
    }
}
