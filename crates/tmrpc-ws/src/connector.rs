//! Dialing seam. The client only ever sees a boxed sink and stream of
//! WebSocket messages, so tests can hand it in-memory channels.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use tmrpc_core::error::TransportError;

pub type WsSink = Pin<Box<dyn Sink<Message, Error = TransportError> + Send>>;
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, TransportError>> + Send>>;

/// Opens one WebSocket connection per call.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsStream), TransportError>;
}

/// Real sockets via `tokio-tungstenite`, TLS through rustls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

fn ws_err(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::WebSocket(e.to_string())
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsStream), TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await.map_err(ws_err)?;
        let (sink, stream) = ws.split();
        Ok((
            Box::pin(sink.sink_map_err(ws_err)),
            Box::pin(stream.map(|msg| msg.map_err(ws_err))),
        ))
    }
}
