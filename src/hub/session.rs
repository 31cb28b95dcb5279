//! Session
//!
//! Per-connection state plus the two loops that drive it:
//!
//! - the **receive loop** reads frames, runs the transform and routes the
//!   resulting deliveries through the registry;
//! - the **send loop** drains the outbound queue onto the connection,
//!   folding whatever is already queued into one newline-joined frame.
//!
//! Either loop ending asks the registry for teardown. The send loop also
//! raises the shutdown signal so a receive loop parked on a read lets go of
//! its half of the connection.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::outbound::{outbound_queue, OutboundQueue, OutboundReceiver};
use super::payload::{Context, Payload};
use super::registry::Registry;
use super::transform::Transform;
use crate::transport::{FrameReader, FrameWriter};

/// Separator between messages coalesced into one frame
pub const COALESCE_SEPARATOR: u8 = b'\n';

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    TearingDown,
    Closed,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Running,
            1 => SessionState::TearingDown,
            _ => SessionState::Closed,
        }
    }
}

/// One admitted connection
pub struct Session {
    id: String,
    group: String,
    subprotocol: Option<String>,
    connected_at: DateTime<Utc>,
    state: AtomicU8,
    outbound: OutboundQueue,
    shutdown: watch::Sender<bool>,
    transform: Arc<dyn Transform>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("subprotocol", &self.subprotocol)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    /// Create a session and the receiving end of its outbound queue
    ///
    /// The session is inert until admitted and started.
    pub fn new(
        group: impl Into<String>,
        id: impl Into<String>,
        subprotocol: Option<String>,
        transform: Arc<dyn Transform>,
    ) -> (Arc<Session>, OutboundReceiver) {
        let (outbound, receiver) = outbound_queue();
        let (shutdown, _) = watch::channel(false);

        let session = Session {
            id: id.into(),
            group: group.into(),
            subprotocol,
            connected_at: Utc::now(),
            state: AtomicU8::new(SessionState::Running as u8),
            outbound,
            shutdown,
            transform,
        };
        (Arc::new(session), receiver)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Messages waiting in the outbound queue
    pub fn pending(&self) -> usize {
        self.outbound.pending()
    }

    /// Enqueue a message for the send loop
    ///
    /// Returns `false` when the session is already tearing down; the message
    /// is dropped, same as for a target that no longer exists.
    pub fn deliver(&self, message: Payload) -> bool {
        self.outbound.enqueue(message)
    }

    /// Move to `TearingDown`; `true` for the first caller only
    pub(crate) fn begin_teardown(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Running as u8,
                SessionState::TearingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_closed(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::Release);
    }

    /// Close the outbound queue; `true` if this call closed it
    pub(crate) fn close_outbound(&self) -> bool {
        self.outbound.close()
    }

    fn signal_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Start the receive and send loops for an admitted session
    pub fn spawn<R, W>(
        self: &Arc<Self>,
        registry: Arc<Registry>,
        outbound: OutboundReceiver,
        reader: R,
        writer: W,
    ) -> SessionTasks
    where
        R: FrameReader,
        W: FrameWriter,
    {
        tracing::info!(
            hub = %registry.name(),
            group = %self.group,
            session_id = %self.id,
            "Session started"
        );

        let receive = tokio::spawn(receive_loop(
            Arc::clone(&registry),
            Arc::clone(self),
            reader,
        ));
        let send = tokio::spawn(send_loop(registry, Arc::clone(self), outbound, writer));

        SessionTasks { receive, send }
    }

    /// Run the transform over one frame and route what it produced
    async fn route_frame(&self, registry: &Registry, frame: Vec<u8>) {
        let ctx = Context::new(self.group.clone(), self.id.clone(), frame)
            .with_subprotocol(self.subprotocol.clone());

        let ctx = match self.transform.apply(ctx) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(
                    hub = %registry.name(),
                    group = %self.group,
                    session_id = %self.id,
                    error = %e,
                    "Transform failed, frame dropped"
                );
                return;
            }
        };

        for delivery in ctx.deliveries {
            let class = delivery.class();
            let delivered = registry.deliver(delivery).await;
            tracing::debug!(
                hub = %registry.name(),
                session_id = %self.id,
                class = %class,
                delivered,
                "Routed delivery"
            );
        }
    }
}

/// Join handles of a session's two loops
pub struct SessionTasks {
    pub receive: JoinHandle<()>,
    pub send: JoinHandle<()>,
}

impl SessionTasks {
    /// Wait until both loops have exited
    ///
    /// Returns `false` if either loop panicked or was cancelled; the failure
    /// is logged.
    pub async fn join(self) -> bool {
        let mut clean = true;
        for (name, task) in [("receive", self.receive), ("send", self.send)] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "Session task failed");
                clean = false;
            }
        }
        clean
    }
}

async fn receive_loop<R: FrameReader>(registry: Arc<Registry>, session: Arc<Session>, mut reader: R) {
    let mut shutdown = session.shutdown.subscribe();

    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            tracing::debug!(session_id = %session.id, "Receive loop stopped by send loop");
            break;
        }

        let result = tokio::select! {
            result = reader.read_frame() => result,
            _ = shutdown.changed() => continue,
        };

        match result {
            Ok(Some(frame)) => session.route_frame(&registry, frame).await,
            Ok(None) => {
                tracing::debug!(session_id = %session.id, "Peer closed connection");
                break;
            }
            Err(e) if e.is_abnormal() => {
                tracing::warn!(
                    hub = %registry.name(),
                    group = %session.group,
                    session_id = %session.id,
                    error = %e,
                    "Connection closed abnormally"
                );
                break;
            }
            Err(e) => {
                tracing::debug!(session_id = %session.id, error = %e, "Connection closed");
                break;
            }
        }
    }

    registry.request_teardown(&session);
    drop(reader);
    tracing::info!(
        hub = %registry.name(),
        group = %session.group,
        session_id = %session.id,
        "Session receive loop closed"
    );
}

async fn send_loop<W: FrameWriter>(
    registry: Arc<Registry>,
    session: Arc<Session>,
    mut outbound: OutboundReceiver,
    mut writer: W,
) {
    let max_coalesce = registry.config().max_coalesce;

    while let Some(first) = outbound.recv().await {
        let queued = match max_coalesce {
            1 => Vec::new(),
            max => outbound.drain_ready(max.saturating_sub(1)),
        };
        let frame = coalesce(first, queued);

        if let Err(e) = writer.write_frame(frame).await {
            if session.state() == SessionState::Running {
                tracing::warn!(
                    hub = %registry.name(),
                    group = %session.group,
                    session_id = %session.id,
                    error = %e,
                    "Write failed, closing session"
                );
            } else {
                tracing::debug!(session_id = %session.id, error = %e, "Write after teardown failed");
            }
            session.close_outbound();
            registry.request_teardown(&session);
            break;
        }
    }

    writer.close().await;
    session.signal_shutdown();
    tracing::info!(
        hub = %registry.name(),
        group = %session.group,
        session_id = %session.id,
        "Session send loop closed"
    );
}

/// Join messages into one frame, newline-separated, in queue order
pub fn coalesce(first: Payload, rest: Vec<Payload>) -> Vec<u8> {
    let len = first.len() + rest.iter().map(|m| m.len() + 1).sum::<usize>();
    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(&first);
    for message in rest {
        frame.push(COALESCE_SEPARATOR);
        frame.extend_from_slice(&message);
    }
    frame
}
