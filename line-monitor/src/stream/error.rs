//! Stream client error types.

use std::time::Duration;

/// Errors from the push channel.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Websocket handshake or transport failure
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection neither opened nor failed in time
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// A frame could not be decoded into a message
    #[error("undecodable frame: {message}")]
    Decode { message: String },

    /// The channel endpoint could not be derived
    #[error("invalid channel endpoint: {0}")]
    Endpoint(String),

    /// Transport failure reported by a non-websocket connector
    #[error("transport error: {0}")]
    Transport(String),
}
