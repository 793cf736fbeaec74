use crate::connection::{SinkAdapter, StreamAdapter};
use crate::error::SessionError;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

/// Write half of an axum websocket.
pub struct AxumWsSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl SinkAdapter for AxumWsSink {
    async fn send_frame(&mut self, frame: String) -> Result<(), SessionError> {
        let message = Message::Text(Utf8Bytes::from(frame));
        Ok(self.sink.send(message).await?)
    }

    async fn send_ping(&mut self) -> Result<(), SessionError> {
        Ok(self.sink.send(Message::Ping(Bytes::new())).await?)
    }
}

/// Read half of an axum websocket. Control frames are skipped.
pub struct AxumWsStream {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl StreamAdapter for AxumWsStream {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
        Ok(None)
    }
}

/// Splits an upgraded socket into the adapters the connection loop expects.
pub fn split(socket: WebSocket) -> (AxumWsStream, AxumWsSink) {
    let (sink, stream) = socket.split();
    (AxumWsStream { stream }, AxumWsSink { sink })
}
