//! Connection Transports
//!
//! A session owns one physical connection split into a reader half (driven
//! by the receive loop) and a writer half (driven by the send loop). The
//! traits here are the only thing the hub knows about the wire.
//!
//! - [`memory`]: channel-backed pair for tests and in-process embedding
//! - [`websocket`]: adapters over axum's WebSocket halves

pub mod memory;
pub mod websocket;

use async_trait::async_trait;

use crate::hub::ConnectionError;

/// Inbound half of a connection
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Wait for the next data frame
    ///
    /// `Ok(None)` means the peer went away without an error (stream ended or
    /// an orderly close frame arrived). Control frames are absorbed here.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError>;
}

/// Outbound half of a connection
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Write one complete frame
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), ConnectionError>;

    /// Close the connection; called once when the send loop exits
    async fn close(&mut self);
}

pub use memory::{MemoryConnection, MemoryPeer};
pub use websocket::{WsReader, WsWriter};
