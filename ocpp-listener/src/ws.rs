//! The WebSocket route handler — the heart of the listener.
//!
//! Flow per connection, split the same way a `ws_handler`/
//! `handle_socket` pair usually is:
//! 1. Pre-upgrade: if the request isn't even a genuine WebSocket
//!    upgrade attempt (no `Connection: Upgrade`, missing
//!    `Sec-WebSocket-Key`, HTTP/1.0, ...), it's a plain-HTTP health
//!    probe — answer it directly with the reserved sentinel code and
//!    touch no session state, without ever reaching auth or the
//!    Communicator.
//! 2. Otherwise: build `SessionInformation`, enforce Basic-auth
//!    password-length bounds, delegate to
//!    `ListenerHandler::authenticate_session`.
//! 3. Upgrade. If the client completed the handshake but didn't
//!    negotiate a known OCPP subprotocol, that's also treated as a
//!    health probe: close the now-open socket with the sentinel code
//!    and still touch no session state.
//! 4. Otherwise: build the Communicator, ask the handler for an event
//!    sink, record the session, and run the inbound message loop.
//! 5. On close: bookkeep a `DisconnectionInformation` unless this was
//!    a sentinel path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ocpp_core::{Communicator, DisconnectionInformation, JsonFrameCodec, Radio, SessionId, SessionInformation};

use crate::config::HEALTH_CHECK_CLOSE_CODE;
use crate::draft;
use crate::error::ListenerError;
use crate::radio::AxumReceiver;
use crate::state::ListenerState;

const KNOWN_SUBPROTOCOLS: [&str; 2] = ["ocpp1.6", "ocpp2.0.1"];

pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<ListenerState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    // `WebSocketUpgrade` is taken as a `Result` rather than bare, so a
    // request missing the upgrade headers entirely — a plain-HTTP
    // health probe — reaches this body instead of being short-circuited
    // into axum's own generic rejection response before we ever see it.
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(path = %uri.path(), rejection = ?rejection, "non-upgrade request on OCPP route, treating as health probe");
            return health_probe_response();
        }
    };

    let info = SessionInformation {
        identifier: uri.path().to_string(),
        internet_address: remote_addr.to_string(),
        proxied_address: forwarded_for(&headers),
    };

    let negotiated_ocpp = offers_known_subprotocol(&headers);

    let (user, pass) = match parse_basic_auth(&headers) {
        Some((u, p)) => (Some(u), Some(p)),
        None => (None, None),
    };

    if let Some(pass) = &pass {
        let len = pass.len();
        let (min, max) = (state.config.min_password_length, state.config.max_password_length);
        if len < min || len > max {
            warn!(identifier = %info.identifier, len, "basic auth password length out of bounds");
            return ListenerError::PasswordLength { len, min, max }.into_response();
        }
    }

    if let Err(e) = state
        .handler
        .authenticate_session(&info, user.as_deref(), pass.as_deref())
        .await
    {
        warn!(identifier = %info.identifier, error = %e, "handshake rejected");
        return e.into_response();
    }

    let session_id = SessionId::new();
    let ws = ws.protocols(KNOWN_SUBPROTOCOLS);
    ws.on_upgrade(move |socket| async move {
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            handle_socket(socket, task_state, info, negotiated_ocpp, session_id).await;
        });
        state.session_tasks.insert(session_id, task.abort_handle());
        let _ = task.await;
        state.session_tasks.remove(&session_id);
    })
}

/// Equivalent-to-the-sentinel-close answer for a request that never
/// negotiated a WebSocket upgrade at all — there is no live socket to
/// send a WS close frame over, so the reserved health-check code is
/// surfaced as a response header instead. No session, no
/// `DisconnectionInformation`, nothing recorded.
fn health_probe_response() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("x-ocpp-health-check-close-code", HEALTH_CHECK_CLOSE_CODE.to_string())
        .body(Body::from("health check"))
        .unwrap()
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn offers_known_subprotocol(headers: &HeaderMap) -> bool {
    headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .any(|p| KNOWN_SUBPROTOCOLS.contains(&p))
        })
        .unwrap_or(false)
}

/// Parse `Authorization: Basic <b64(user:pass)>`, splitting once on the
/// first `:`.
fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<ListenerState>,
    info: SessionInformation,
    negotiated_ocpp: bool,
    session_id: SessionId,
) {
    let (sink, mut stream) = socket.split();
    let radio = AxumReceiver::new(sink);

    if !negotiated_ocpp {
        debug!(identifier = %info.identifier, "no known OCPP subprotocol offered, treating as health probe");
        radio.close_with_code(HEALTH_CHECK_CLOSE_CODE, "health check").await;
        return;
    }

    let comm = Communicator::new(
        JsonFrameCodec,
        radio.clone() as Arc<dyn Radio>,
        Arc::clone(&state.transaction_related),
        state.queue_enabled,
    );

    comm.set_session_id(session_id);

    let events = state.handler.new_session(Arc::clone(&comm), &info).await;
    comm.bind_events(events);

    state.sessions.insert(session_id, Arc::clone(&comm));
    info!(session_id = %session_id, identifier = %info.identifier, "session accepted");
    comm.notify_connected().await;

    let (mut close_code, mut reason) = (1000i32, String::from("normal"));

    // Connection-lost timeout: ping on every tick, and treat the peer as
    // gone if nothing — frame or pong — has arrived since the previous
    // tick. One ticker period is the detection window, matching
    // PING_INTERVAL's role as "connection-lost timeout via ping/pong"
    // rather than a fixed round-trip deadline.
    let ping_interval = Duration::from_secs(state.config.ping_interval_secs.max(1));
    let mut ticker = tokio::time::interval(ping_interval);
    ticker.tick().await; // first tick fires immediately; consume it
    let mut last_seen = Instant::now();

    'recv: loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                radio.close_with_code(1001, "server shutting down").await;
                close_code = 1001;
                reason = "server shutting down".to_string();
                break 'recv;
            }
            _ = ticker.tick() => {
                if last_seen.elapsed() >= ping_interval {
                    warn!(session_id = %session_id, "connection-lost timeout: no traffic since last ping");
                    close_code = 1006;
                    reason = "ping timeout".to_string();
                    break 'recv;
                }
                if !radio.ping().await {
                    close_code = 1006;
                    reason = "abnormal".to_string();
                    break 'recv;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        if let Some(wire) = draft::decode(text.as_bytes()) {
                            comm.handle_wire(wire).await;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(CloseFrame { code, reason: r }) = frame {
                            close_code = code as i32;
                            reason = r.to_string();
                        }
                        break 'recv;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(_)) => {
                        last_seen = Instant::now();
                    }
                    None => break 'recv,
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "ws recv error");
                        close_code = 1006;
                        reason = "abnormal".to_string();
                        break 'recv;
                    }
                }
            }
        }
    }

    comm.notify_disconnected().await;
    state.sessions.remove(&session_id);
    state.disconnections.insert(
        session_id,
        DisconnectionInformation {
            code: close_code,
            remote: true,
            reason,
        },
    );
    info!(session_id = %session_id, code = close_code, "session closed");
}
