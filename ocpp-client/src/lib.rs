//! Client-side transport binding: a `Radio` that dials an OCPP-J
//! server over WebSocket.

pub mod transmitter;

pub use transmitter::WsTransmitter;
