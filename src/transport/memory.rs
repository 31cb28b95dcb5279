//! In-memory transport
//!
//! A connection made of two unbounded channels. The hub side gets a
//! [`MemoryConnection`] (reader + writer halves); the test or embedding side
//! keeps the [`MemoryPeer`] and plays the remote client, including orderly
//! closes and injected failures.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{FrameReader, FrameWriter};
use crate::hub::ConnectionError;

/// What the peer pushes towards the hub
#[derive(Debug)]
enum PeerEvent {
    Frame(Vec<u8>),
    Close(Option<u16>),
    Fail(String),
}

/// Hub side of an in-memory connection
pub struct MemoryConnection {
    pub reader: MemoryReader,
    pub writer: MemoryWriter,
}

impl MemoryConnection {
    /// Create a connected (hub side, peer side) pair
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));

        let connection = MemoryConnection {
            reader: MemoryReader { inbound: inbound_rx },
            writer: MemoryWriter {
                outbound: Some(outbound_tx),
                fail_writes: Arc::clone(&fail_writes),
            },
        };
        let peer = MemoryPeer {
            inbound: inbound_tx,
            outbound: outbound_rx,
            fail_writes,
        };

        (connection, peer)
    }

    pub fn into_split(self) -> (MemoryReader, MemoryWriter) {
        (self.reader, self.writer)
    }
}

/// Reader half fed by [`MemoryPeer`]
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<PeerEvent>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        match self.inbound.recv().await {
            Some(PeerEvent::Frame(frame)) => Ok(Some(frame)),
            Some(PeerEvent::Close(code)) => {
                let err = ConnectionError::Closed {
                    code,
                    reason: "peer closed".to_string(),
                };
                if err.is_abnormal() {
                    Err(err)
                } else {
                    Ok(None)
                }
            }
            Some(PeerEvent::Fail(reason)) => Err(ConnectionError::Transport(reason)),
            None => Ok(None),
        }
    }
}

/// Writer half draining into [`MemoryPeer`]
pub struct MemoryWriter {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), ConnectionError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(ConnectionError::Transport("write failed".to_string()));
        }
        let outbound = self.outbound.as_ref().ok_or_else(|| ConnectionError::Closed {
            code: None,
            reason: "writer closed".to_string(),
        })?;
        outbound
            .send(frame)
            .map_err(|_| ConnectionError::Transport("peer dropped".to_string()))
    }

    async fn close(&mut self) {
        self.outbound = None;
    }
}

/// Remote end of an in-memory connection
pub struct MemoryPeer {
    inbound: mpsc::UnboundedSender<PeerEvent>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// Send a data frame to the hub; false once the reader is gone
    pub fn send(&self, frame: impl Into<Vec<u8>>) -> bool {
        self.inbound.send(PeerEvent::Frame(frame.into())).is_ok()
    }

    /// Send a close frame with an optional close code
    pub fn close(&self, code: Option<u16>) {
        let _ = self.inbound.send(PeerEvent::Close(code));
    }

    /// Make the hub's next read fail with a transport error
    pub fn fail_reads(&self, reason: impl Into<String>) {
        let _ = self.inbound.send(PeerEvent::Fail(reason.into()));
    }

    /// Make every subsequent write from the hub fail
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::Release);
    }

    /// Next frame written by the hub; `None` once the writer is closed
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Frame already written by the hub, without waiting
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }
}
