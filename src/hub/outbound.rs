//! Outbound queue
//!
//! FIFO of messages waiting to be written to one session's connection.
//! Any task may enqueue; only the session's send loop dequeues. Closing is
//! explicit state: once closed, `enqueue` reports `false` instead of failing,
//! and the receiver drains what is left and then ends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::payload::Payload;

/// Producer side, shared by everyone delivering to the session
pub struct OutboundQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Payload>>>,
    pending: Arc<AtomicUsize>,
}

/// Consumer side, owned by the send loop
pub struct OutboundReceiver {
    receiver: mpsc::UnboundedReceiver<Payload>,
    pending: Arc<AtomicUsize>,
}

/// Create a connected queue pair
pub fn outbound_queue() -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    (
        OutboundQueue {
            sender: Mutex::new(Some(tx)),
            pending: Arc::clone(&pending),
        },
        OutboundReceiver {
            receiver: rx,
            pending,
        },
    )
}

impl OutboundQueue {
    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Payload>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message; `false` if the queue is closed
    pub fn enqueue(&self, message: Payload) -> bool {
        let sender = self.sender();
        let Some(tx) = sender.as_ref() else {
            return false;
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(message).is_ok() {
            true
        } else {
            // Send loop already gone
            self.pending.fetch_sub(1, Ordering::AcqRel);
            false
        }
    }

    /// Close the queue; returns `true` only for the call that closed it
    pub fn close(&self) -> bool {
        self.sender().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender().as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Messages enqueued but not yet taken by the send loop
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl OutboundReceiver {
    /// Wait for the next message; `None` once closed and drained
    pub async fn recv(&mut self) -> Option<Payload> {
        let message = self.receiver.recv().await?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Take the messages queued at this instant, without waiting
    ///
    /// The count is fixed when the call starts, so messages arriving during
    /// the drain are left for the next call. `limit` of zero means no cap.
    pub fn drain_ready(&mut self, limit: usize) -> Vec<Payload> {
        let mut ready = self.pending.load(Ordering::Acquire);
        if limit > 0 {
            ready = ready.min(limit);
        }

        let mut drained = Vec::with_capacity(ready);
        while drained.len() < ready {
            match self.receiver.try_recv() {
                Ok(message) => {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    drained.push(message);
                }
                Err(_) => break,
            }
        }
        drained
    }
}
