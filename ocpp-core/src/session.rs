//! Session identity and bookkeeping types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque 128-bit identifier, unique per process, assigned when a
/// Session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable metadata about a connected peer.
#[derive(Debug, Clone)]
pub struct SessionInformation {
    /// Resource descriptor — conventionally `/<chargePointIdentity>`.
    pub identifier: String,
    /// Remote socket address, as seen by the listener.
    pub internet_address: String,
    /// `X-Forwarded-For` value, if the connection came through a proxy.
    pub proxied_address: Option<String>,
}

/// Stashed under a `SessionId` at close, retrievable exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectionInformation {
    pub code: i32,
    pub remote: bool,
    pub reason: String,
}
