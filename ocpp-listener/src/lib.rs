//! WebSocket Listener: multiplexes many charge-point sessions onto one
//! axum server.

pub mod config;
pub mod draft;
pub mod error;
pub mod handler;
pub mod radio;
pub mod state;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::Config;
pub use error::ListenerError;
pub use handler::ListenerHandler;
pub use state::ListenerState;

use ocpp_core::TransactionClassifier;

/// Build the axum router: the OCPP WebSocket route plus `/healthz`.
pub fn router(state: Arc<ListenerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/{*identifier}", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Bind and serve. `REUSE_ADDR` and `TCP_NO_DELAY` are read into
/// `Config`, but binding here goes through a plain
/// `tokio::net::TcpListener` rather than a raw socket builder: nothing
/// in this dependency stack wraps `SO_REUSEADDR`/`TCP_NODELAY`
/// directly, and tokio's listener already reuses the address on the
/// platforms this targets (see DESIGN.md). `WEBSOCKET_WORKER_COUNT` is
/// likewise read into `Config` but not applied here: this crate is a
/// library called from inside an already-running tokio runtime, so by
/// the time `serve` runs the worker pool size is long since fixed by
/// whatever built that runtime (`#[tokio::main(worker_threads = ..)]`
/// or a manual `Builder`) — the embedding binary, which this workspace
/// intentionally doesn't ship (see SPEC_FULL.md §8), is the only place
/// that knob could ever take effect. `PING_INTERVAL` is the one
/// config-table knob this crate does enforce directly: each accepted
/// session's receive loop pings on that cadence and treats a silent
/// interval as connection loss (see `ws::handle_socket`).
pub async fn serve(
    listen_addr: &str,
    handler: Arc<dyn ListenerHandler>,
    transaction_related: TransactionClassifier,
    queue_enabled: bool,
) -> std::io::Result<()> {
    let config = Config::from_env();
    let state = ListenerState::new(config, handler, transaction_related, queue_enabled);
    let shutdown = state.shutdown.clone();

    let app = router(Arc::clone(&state)).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    info!(addr = %listen_addr, "ocpp-listener serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
}

/// Graceful shutdown with a forceful fallback: signal the server to
/// stop accepting and wake every session's receive loop via
/// `state.shutdown`, wait up to `budget` for those loops to notice and
/// exit on their own, then — if any are still open, e.g. one blocked
/// somewhere other than the `tokio::select!` that watches
/// `shutdown.cancelled()` — `abort()` their socket tasks directly.
/// Either way, `close()` does not return until no session is left.
pub async fn close(state: &ListenerState, budget: Duration) {
    state.shutdown.cancel();
    let waited = tokio::time::Instant::now();
    while state.session_count() > 0 && waited.elapsed() < budget {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if state.session_count() > 0 {
        warn!(remaining = state.session_count(), "close() budget exceeded, forcing sessions closed");
        for entry in state.session_tasks.iter() {
            entry.value().abort();
        }
        state.session_tasks.clear();
        state.sessions.clear();
    }
}
