//! Error taxonomy for the synchronization engine.
//!
//! None of these are fatal to the process: transport errors are recovered by
//! the reconnect loop, fetch errors leave state unchanged until the next
//! cycle, and malformed payloads are discarded at the reader.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// A REST collaborator failed or returned a non-success status.
    /// Treated as "no data" by callers.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// An inbound frame or body that does not parse. The offending event is
    /// dropped; everything else is unaffected.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Publish attempted while the connection is down. Not queued.
    #[error("not connected")]
    NotConnected,

    /// The outbound frame queue is full (slow or wedged writer).
    #[error("outbound queue full")]
    QueueFull,

    #[error("websocket: {0}")]
    WebSocket(String),
}
