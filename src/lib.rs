//! # Lazyhub
//!
//! Pub/sub routing hub for persistent, bidirectional, message-oriented
//! connections.
//!
//! ## Features
//!
//! - **Groups and identifiers**: every connection is admitted into a named
//!   group under an identifier unique within that group
//! - **Three delivery targets**: one connection, one group, or everyone
//! - **Pluggable routing**: a per-message transform decides where each
//!   inbound frame goes
//! - **Failure isolation**: one connection failing tears down only its own
//!   session, removed from the table exactly once
//! - **Coalescing writes**: messages already queued for a connection go out
//!   as one newline-joined frame
//!
//! ## Modules
//!
//! - [`hub`]: registry, sessions, transforms and the payload model
//! - [`transport`]: connection halves (in-memory and WebSocket)
//! - [`server`]: axum router admitting WebSocket upgrades
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lazyhub::hub::{EchoTransform, Registry};
//! use lazyhub::transport::MemoryConnection;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::create("demo");
//!
//!     let (conn, mut peer) = MemoryConnection::pair();
//!     let (reader, writer) = conn.into_split();
//!     registry
//!         .join("lobby", None, Arc::new(EchoTransform), reader, writer)
//!         .await?;
//!
//!     peer.send(b"hello".to_vec());
//!     assert_eq!(peer.recv().await, Some(b"hello".to_vec()));
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod hub;
pub mod server;
pub mod transport;

// Re-export top-level types for convenience
pub use hub::{
    Context, Delivery, DeliveryClass, EchoTransform, EnvelopeTransform, HubConfig, HubError,
    HubResult, Registry, Session, SessionHandle, SessionState, Transform, TransformError,
};

pub use transport::{FrameReader, FrameWriter, MemoryConnection, MemoryPeer};

pub use server::{build_router, serve, AppState, ServerError};

pub use config::{Config, ConfigError, HubSettings, LoggingConfig, ServerConfig, TransformKind};
