//! Transport-agnostic OCPP-J message framing, correlation and
//! transaction-retry engine.
//!
//! This crate is the core of the engine: the
//! `Communicator` (per-session message pump), the offline transaction
//! queue with its `RetryRunner`, the `Radio` transport abstraction, and
//! the `FrameCodec` capability the Communicator is generic over. It
//! knows nothing about WebSocket handshakes, HTTP auth, or which side of
//! a connection it's running on — `ocpp-listener` and `ocpp-client`
//! supply that.

pub mod codec;
pub mod communicator;
pub mod error;
pub mod listener_hook;
pub mod message;
pub mod queue;
pub mod radio;
pub mod retry;
pub mod session;

pub use codec::{FrameCodec, JsonFrameCodec};
pub use communicator::{Communicator, TransportEventsAdapter};
pub use error::CommunicatorError;
pub use listener_hook::{install_message_listener, message_listener, MessageListener};
pub use message::{Frame, Opaque};
pub use queue::OfflineQueue;
pub use radio::{CommunicatorEvents, Confirmation, Radio, TransactionClassifier, TransportEvents};
pub use retry::RetryRunner;
pub use session::{DisconnectionInformation, SessionId, SessionInformation};
