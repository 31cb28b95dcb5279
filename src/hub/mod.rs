//! Routing Hub
//!
//! Connection registry and per-connection delivery engine.
//!
//! ## Architecture
//!
//! - **Registry**: group → identifier → session table, identifier allocation,
//!   unicast / group-cast / broadcast, and the teardown coordinator
//! - **Session**: one connection, driven by a receive loop and a send loop
//! - **Transform**: caller-supplied routing plugin run on every inbound frame
//! - **Payload**: the [`Context`] a transform sees and the [`Delivery`]
//!   instructions it emits
//!
//! ## Example
//!
//! ```rust,no_run
//! use lazyhub::hub::{Context, Registry, TransformError};
//! use lazyhub::transport::MemoryConnection;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::create("chat");
//!
//! // Every frame is relayed to the sender's whole group
//! let transform = Arc::new(|mut ctx: Context| -> Result<Context, TransformError> {
//!     let (group, message) = (ctx.group.clone(), ctx.message.clone());
//!     ctx.group_cast(group, message);
//!     Ok(ctx)
//! });
//!
//! let (conn, peer) = MemoryConnection::pair();
//! let (reader, writer) = conn.into_split();
//! let handle = registry.join("lobby", None, transform, reader, writer).await?;
//!
//! peer.send(b"hello".to_vec());
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```

mod error;
mod outbound;
mod payload;
mod registry;
mod session;
mod transform;

pub use error::{ConnectionError, HubError, HubResult, TransformError};
pub use outbound::{outbound_queue, OutboundQueue, OutboundReceiver};
pub use payload::{Context, Delivery, DeliveryClass, Payload};
pub use registry::{HubConfig, Registry, SessionHandle};
pub use session::{coalesce, Session, SessionState, SessionTasks, COALESCE_SEPARATOR};
pub use transform::{EchoTransform, Envelope, EnvelopeTransform, Transform};
