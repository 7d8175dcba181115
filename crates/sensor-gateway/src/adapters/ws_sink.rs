//! Frame sink over the write half of an axum WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;

use crate::domain::error::TransportError;
use crate::ports::FrameSink;

/// Serializes writes from the bus listener and the read loop onto one socket.
pub struct WsFrameSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsFrameSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(TransportError::from)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        // Best effort close frame; the peer may already be gone
        let _ = sink.send(Message::Close(None)).await;
        sink.close()
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
