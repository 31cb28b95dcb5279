//! Payload Model
//!
//! The per-frame [`Context`] handed to a transform and the [`Delivery`]
//! instructions a transform produces. Pure data, no routing behavior.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque outbound message body, shared across fan-out targets
pub type Payload = Arc<[u8]>;

/// Wire-independent tag naming a delivery class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryClass {
    /// One session addressed by group and identifier
    #[serde(rename = "channel")]
    Unicast,
    /// Every session in one group
    #[serde(rename = "group")]
    GroupCast,
    /// Every session in the hub
    #[serde(rename = "broadcast")]
    Broadcast,
}

impl DeliveryClass {
    /// The tag used on the wire for this class
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryClass::Unicast => "channel",
            DeliveryClass::GroupCast => "group",
            DeliveryClass::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for DeliveryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One routing instruction produced by a transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Deliver to a single session
    Unicast {
        group: String,
        id: String,
        message: Payload,
    },
    /// Deliver to every session in `group`
    GroupCast { group: String, message: Payload },
    /// Deliver to every session
    Broadcast { message: Payload },
}

impl Delivery {
    pub fn class(&self) -> DeliveryClass {
        match self {
            Delivery::Unicast { .. } => DeliveryClass::Unicast,
            Delivery::GroupCast { .. } => DeliveryClass::GroupCast,
            Delivery::Broadcast { .. } => DeliveryClass::Broadcast,
        }
    }

    pub fn message(&self) -> &[u8] {
        match self {
            Delivery::Unicast { message, .. }
            | Delivery::GroupCast { message, .. }
            | Delivery::Broadcast { message } => message,
        }
    }
}

/// Inbound frame context, built once per frame by the receive loop
#[derive(Debug, Clone)]
pub struct Context {
    /// Identifier of the originating session
    pub session_id: String,
    /// Group of the originating session
    pub group: String,
    /// Subprotocol negotiated by the originating connection, if any
    pub subprotocol: Option<String>,
    /// Raw frame bytes as received
    pub message: Vec<u8>,
    /// Deliveries accumulated by the transform, routed in order
    pub deliveries: Vec<Delivery>,
}

impl Context {
    /// Create a context for a frame received from `group`/`session_id`
    pub fn new(
        group: impl Into<String>,
        session_id: impl Into<String>,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            group: group.into(),
            subprotocol: None,
            message: message.into(),
            deliveries: Vec::new(),
        }
    }

    /// Attach the negotiated subprotocol
    pub fn with_subprotocol(mut self, subprotocol: Option<String>) -> Self {
        self.subprotocol = subprotocol;
        self
    }

    /// Append a delivery
    pub fn push(&mut self, delivery: Delivery) -> &mut Self {
        self.deliveries.push(delivery);
        self
    }

    /// Queue `message` for the session `group`/`id`
    pub fn unicast(
        &mut self,
        group: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<Payload>,
    ) -> &mut Self {
        self.push(Delivery::Unicast {
            group: group.into(),
            id: id.into(),
            message: message.into(),
        })
    }

    /// Queue `message` for every session in `group`
    pub fn group_cast(&mut self, group: impl Into<String>, message: impl Into<Payload>) -> &mut Self {
        self.push(Delivery::GroupCast {
            group: group.into(),
            message: message.into(),
        })
    }

    /// Queue `message` for every session in the hub
    pub fn broadcast(&mut self, message: impl Into<Payload>) -> &mut Self {
        self.push(Delivery::Broadcast {
            message: message.into(),
        })
    }

    /// Queue `message` back to the originating session
    pub fn reply(&mut self, message: impl Into<Payload>) -> &mut Self {
        let group = self.group.clone();
        let id = self.session_id.clone();
        self.unicast(group, id, message)
    }
}
