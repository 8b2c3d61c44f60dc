//! Error types for the listener.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can reject a handshake or abort the listener itself.
///
/// `Authentication` carries its own status code, the way an
/// `AuthenticationException` would. It's kept here rather than on
/// `CommunicatorError` because HTTP auth is a listener/handshake
/// concept, outside the transport-agnostic core.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ListenerError {
    #[error("authentication failed: {message}")]
    Authentication { code: StatusCodeWrapper, message: String },

    #[error("password length {len} outside [{min}, {max}]")]
    PasswordLength { len: usize, min: usize, max: usize },

    #[error("bind failed: {0}")]
    Bind(String),
}

/// `StatusCode` isn't `Eq`/hashable in a way that plays nicely with
/// `thiserror`'s derive across all versions, and error enums shouldn't
/// carry a dependency on exact HTTP semantics beyond "some 4xx" — this
/// newtype keeps the raw code without pulling axum deeper into the
/// variant's derive bounds than necessary.
#[derive(Debug, Clone, Copy)]
pub struct StatusCodeWrapper(pub u16);

impl std::fmt::Display for StatusCodeWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl IntoResponse for ListenerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ListenerError::Authentication { code, .. } => {
                StatusCode::from_u16(code.0).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            ListenerError::PasswordLength { .. } => StatusCode::UNAUTHORIZED,
            ListenerError::Bind(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
