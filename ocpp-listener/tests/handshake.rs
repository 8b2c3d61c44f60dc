//! Handshake-level integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use ocpp_core::{Communicator, CommunicatorEvents, JsonFrameCodec, Opaque, SessionInformation};
use ocpp_listener::error::ListenerError;
use ocpp_listener::handler::ListenerHandler;
use ocpp_listener::state::ListenerState;
use ocpp_listener::{router, Config};

struct AllowAllHandler;

#[async_trait]
impl ListenerHandler for AllowAllHandler {
    async fn authenticate_session(
        &self,
        _info: &SessionInformation,
        _user: Option<&str>,
        _pass: Option<&str>,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn new_session(
        &self,
        _comm: Arc<Communicator<JsonFrameCodec>>,
        _info: &SessionInformation,
    ) -> Arc<dyn CommunicatorEvents> {
        struct NoopEvents;
        #[async_trait]
        impl CommunicatorEvents for NoopEvents {
            async fn on_call(&self, _id: &str, _action: &str, _payload: Opaque) {}
            async fn on_call_result(&self, _id: &str, _action: &str, _payload: Opaque) {}
            async fn on_error(&self, _id: &str, _code: &str, _description: &str, _context: Opaque) {}
        }
        Arc::new(NoopEvents)
    }
}

fn test_state() -> Arc<ListenerState> {
    let mut config = Config::from_env();
    config.min_password_length = 16;
    config.max_password_length = 40;
    ListenerState::new(
        config,
        Arc::new(AllowAllHandler),
        Arc::new(|_action: &str| false),
        false,
    )
}

fn basic_auth(user: &str, pass: &str) -> String {
    use base64::Engine;
    let raw = format!("{user}:{pass}");
    format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
}

/// Every request needs `ConnectInfo` in its extensions since the real
/// router is normally served via `into_make_service_with_connect_info`;
/// a bare `oneshot` call skips that layer, so tests insert it directly.
fn request(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4400))))
}

#[tokio::test]
async fn healthz_route_is_ok() {
    let app = router(test_state());
    let response = app
        .oneshot(request("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// S4: a short Basic-auth password is rejected with 401 before any
/// session is recorded, even on an otherwise well-formed upgrade.
#[tokio::test]
async fn short_password_rejected_with_401() {
    let app = router(test_state());

    let req = request("/cp1")
        .header("connection", "Upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("sec-websocket-protocol", "ocpp1.6")
        .header("authorization", basic_auth("user", "short"))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// A password within bounds is let through to the upgrade (101).
#[tokio::test]
async fn valid_password_length_upgrades() {
    let app = router(test_state());

    let req = request("/cp1")
        .header("connection", "Upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("sec-websocket-protocol", "ocpp1.6")
        .header("authorization", basic_auth("user", "a-sufficiently-long-password"))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
}
