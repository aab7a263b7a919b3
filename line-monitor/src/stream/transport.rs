//! Transport seam between the stream client and the network.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

use super::error::StreamError;

/// Incoming text frames of one live connection.
///
/// The stream ends when the connection closes; dropping it closes the
/// connection.
pub type FrameStream = BoxStream<'static, Result<String, StreamError>>;

/// Opens connections to the push channel.
pub trait Connector: Send + Sync + 'static {
    /// Start one connection attempt.
    fn open(&self) -> BoxFuture<'static, Result<FrameStream, StreamError>>;
}

/// Websocket connector.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&self) -> BoxFuture<'static, Result<FrameStream, StreamError>> {
        let url = self.url.clone();
        async move {
            let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

            let frames = socket
                .filter_map(|message| async move {
                    match message {
                        Ok(Message::Text(text)) => Some(Ok(text)),
                        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                            Ok(text) => Some(Ok(text)),
                            Err(_) => {
                                warn!("dropping non-UTF-8 binary frame");
                                None
                            }
                        },
                        // ping/pong are answered by tungstenite; close ends the stream
                        Ok(_) => None,
                        Err(e) => Some(Err(StreamError::from(e))),
                    }
                })
                .boxed();

            Ok(frames)
        }
        .boxed()
    }
}
