//! Error types for the core engine.
//!
//! Recoverable conditions are modeled as data: tagged results at public
//! boundaries, not exceptions. `unwrap`/`expect` in this crate's
//! non-test code should only ever guard an invariant that's true by
//! construction.

use thiserror::Error;

/// Errors the Communicator and its transport bindings can report.
///
/// `NotConnected` is the only error `Radio::send` may return — the
/// transport abstraction promises nothing richer, so the Communicator's
/// enqueue-or-notify logic only has to branch on one failure mode.
#[derive(Debug, Error, Clone)]
pub enum CommunicatorError {
    #[error("not connected")]
    NotConnected,

    #[error("conversion error: {0}")]
    Conversion(String),

    #[error("confirmation completed handler failed: {0}")]
    ConfirmationHandlerFailed(String),
}

impl CommunicatorError {
    /// The OCPP error code carried in a `CallError` built from this error.
    pub fn ocpp_code(&self) -> &'static str {
        match self {
            CommunicatorError::NotConnected => "Not connected",
            CommunicatorError::Conversion(_) => "FormationViolation",
            CommunicatorError::ConfirmationHandlerFailed(_) => {
                "ConfirmationCompletedHandlerFailed"
            }
        }
    }
}
