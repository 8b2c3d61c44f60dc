//! End-to-end roundtrip against a bare `tokio-tungstenite` server peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as TMessage;

use ocpp_client::WsTransmitter;
use ocpp_core::{Communicator, CommunicatorEvents, JsonFrameCodec, Opaque, Radio};

#[derive(Default)]
struct RecordingEvents {
    connected: AtomicBool,
    calls: Mutex<Vec<(String, String, Opaque)>>,
}

#[async_trait]
impl CommunicatorEvents for RecordingEvents {
    async fn on_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }
    async fn on_call(&self, id: &str, action: &str, payload: Opaque) {
        self.calls
            .lock()
            .await
            .push((id.to_string(), action.to_string(), payload));
    }
    async fn on_call_result(&self, _id: &str, _action: &str, _payload: Opaque) {}
    async fn on_error(&self, _id: &str, _code: &str, _description: &str, _context: Opaque) {}
}

#[tokio::test]
async fn connect_and_exchange_heartbeat() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A bare server peer: accept one connection, send a BootNotification
    // Call, then echo back whatever it receives as a CallResult.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();

        tx.send(TMessage::Text(
            r#"[2,"srv-1","BootNotification",{}]"#.to_string().into(),
        ))
        .await
        .unwrap();

        if let Some(Ok(TMessage::Text(_text))) = rx.next().await {
            tx.send(TMessage::Text(r#"[3,"srv-1",{}]"#.to_string().into()))
                .await
                .unwrap();
        }
    });

    let radio = WsTransmitter::new();
    let comm = Communicator::new(
        JsonFrameCodec,
        radio.clone() as Arc<dyn Radio>,
        Arc::new(|_action: &str| false),
        false,
    );
    let events = Arc::new(RecordingEvents::default());
    comm.bind_events(events.clone());

    radio
        .connect(&format!("ws://{addr}"), &comm)
        .await
        .expect("connect should succeed against a listening peer");

    // Give the background read pump a moment to deliver the server's Call.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(events.connected.load(Ordering::SeqCst));
    assert_eq!(events.calls.lock().await.len(), 1);

    comm.send_call_result("srv-1", "BootNotification", &serde_json::json!({}))
        .await
        .unwrap();
}
