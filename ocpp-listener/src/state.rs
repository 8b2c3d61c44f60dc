//! Shared listener state.
//!
//! The source keys two maps off the socket object identity: `socket →
//! receiver` and `socket → sessionId`. Here a `SessionId` is minted at
//! accept time, before any per-socket handle is needed, so both
//! collapse into one `DashMap<SessionId, Arc<Communicator<..>>>` —
//! there's no socket-identity key distinct from the session id to key
//! a second map by.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use ocpp_core::{Communicator, DisconnectionInformation, JsonFrameCodec, SessionId, TransactionClassifier};

use crate::config::Config;
use crate::handler::ListenerHandler;

pub struct ListenerState {
    pub config: Config,
    pub handler: Arc<dyn ListenerHandler>,
    pub transaction_related: TransactionClassifier,
    pub queue_enabled: bool,

    pub(crate) sessions: DashMap<SessionId, Arc<Communicator<JsonFrameCodec>>>,
    pub(crate) disconnections: DashMap<SessionId, DisconnectionInformation>,

    /// Handle to each session's socket task, so `close()` can force a
    /// session closed once its graceful-shutdown budget is exceeded —
    /// cooperative cancellation via `shutdown` alone only reaches
    /// sessions currently idle in their `tokio::select!`.
    pub(crate) session_tasks: DashMap<SessionId, AbortHandle>,

    pub(crate) shutdown: CancellationToken,
}

impl ListenerState {
    pub fn new(
        config: Config,
        handler: Arc<dyn ListenerHandler>,
        transaction_related: TransactionClassifier,
        queue_enabled: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            handler,
            transaction_related,
            queue_enabled,
            sessions: DashMap::new(),
            disconnections: DashMap::new(),
            session_tasks: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Retrieve and clear the disconnection record for a session — the
    /// application may call this exactly once per session.
    pub fn remove_disconnection_information(&self, id: SessionId) -> Option<DisconnectionInformation> {
        self.disconnections.remove(&id).map(|(_, v)| v)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ocpp_core::{CommunicatorEvents, Opaque, SessionInformation};

    use super::*;
    use crate::error::ListenerError;

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

    // S6: a disconnection record is returned once, then gone.
    #[test]
    fn disconnection_information_consumed_once() {
        let state = ListenerState::new(
            Config::from_env(),
            Arc::new(AllowAllHandler),
            Arc::new(|_action: &str| false),
            false,
        );
        let id = SessionId::new();
        state.disconnections.insert(
            id,
            DisconnectionInformation {
                code: 1006,
                remote: true,
                reason: "abnormal".to_string(),
            },
        );

        let first = state.remove_disconnection_information(id);
        assert_eq!(
            first,
            Some(DisconnectionInformation {
                code: 1006,
                remote: true,
                reason: "abnormal".to_string(),
            })
        );
        assert_eq!(state.remove_disconnection_information(id), None);
    }
}
