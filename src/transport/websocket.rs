//! WebSocket transport
//!
//! Adapts the two halves of an upgraded axum [`WebSocket`] to the
//! [`FrameReader`]/[`FrameWriter`] traits. The upgrade itself is handled by
//! axum; see `server::routes::ws`.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use super::{FrameReader, FrameWriter};
use crate::hub::ConnectionError;

/// Split an upgraded socket into hub reader and writer halves
pub fn split(socket: WebSocket) -> (WsReader, WsWriter) {
    let (sink, stream) = socket.split();
    (WsReader { stream }, WsWriter { sink })
}

/// Receiving half of a WebSocket
pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        while let Some(result) = self.stream.next().await {
            let message =
                result.map_err(|e| ConnectionError::Transport(e.to_string()))?;

            match message {
                Message::Text(text) => return Ok(Some(text.into_bytes())),
                Message::Binary(data) => return Ok(Some(data)),
                // Ping/pong are answered by axum
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => return close_outcome(frame),
            }
        }
        Ok(None)
    }
}

fn close_outcome(frame: Option<CloseFrame<'static>>) -> Result<Option<Vec<u8>>, ConnectionError> {
    let Some(frame) = frame else {
        return Ok(None);
    };

    let err = ConnectionError::Closed {
        code: Some(frame.code),
        reason: frame.reason.into_owned(),
    };
    if err.is_abnormal() {
        Err(err)
    } else {
        Ok(None)
    }
}

/// Sending half of a WebSocket
pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), ConnectionError> {
        // Text when possible so browser clients get strings
        let message = match String::from_utf8(frame) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
