//! Listener configuration — all from environment variables.

use std::env;

/// Reserved close code for plain-HTTP health probes that reach the
/// WebSocket route without negotiating an OCPP subprotocol.
pub const HEALTH_CHECK_CLOSE_CODE: u16 = 4004;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Size of the tokio runtime's worker pool.
    pub websocket_worker_count: usize,
    pub reuse_addr: bool,
    pub tcp_no_delay: bool,
    pub ping_interval_secs: u64,
    pub min_password_length: usize,
    pub max_password_length: usize,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8887".into()),
            websocket_worker_count: env::var("WEBSOCKET_WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            reuse_addr: env::var("REUSE_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            tcp_no_delay: env::var("TCP_NO_DELAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            ping_interval_secs: env::var("PING_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            min_password_length: env::var("OCPPJ_CP_MIN_PASSWORD_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
            max_password_length: env::var("OCPPJ_CP_MAX_PASSWORD_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(40),
            log_level: env::var("RUST_LOG")
                .unwrap_or_else(|_| "ocpp_listener=info,tower_http=info".into()),
        }
    }
}
