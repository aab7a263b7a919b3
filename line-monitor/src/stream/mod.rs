//! Push-channel client.
//!
//! One persistent websocket to the backend's real-time channel. The client
//! is an actor: a single task owns the connection, the reconnect timer and
//! the attempt counter, and every `connect`/`disconnect` request is processed
//! there in order. Decoded messages leave through a bounded queue so the
//! transport never touches line state directly.

mod client;
mod endpoint;
mod error;
mod message;
mod state;
mod transport;

pub use client::{StreamClient, StreamConfig};
pub use endpoint::channel_url;
pub use error::StreamError;
pub use message::{MessageKind, StreamMessage};
pub use state::{ConnectionMachine, ConnectionState, Effect, ReconnectPolicy};
pub use transport::{Connector, FrameStream, WsConnector};
