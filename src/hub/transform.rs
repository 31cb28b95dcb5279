//! Transforms
//!
//! A transform inspects one inbound [`Context`] and returns it with zero or
//! more [`Delivery`](super::Delivery) instructions attached. It runs on the
//! session's receive loop, so it must not block for long, and one instance
//! is shared by every session admitted with it.

use serde::Deserialize;

use super::error::TransformError;
use super::payload::{Context, DeliveryClass};

/// Per-message routing plugin
pub trait Transform: Send + Sync {
    /// Produce the deliveries for one inbound frame
    fn apply(&self, ctx: Context) -> Result<Context, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(Context) -> Result<Context, TransformError> + Send + Sync,
{
    fn apply(&self, ctx: Context) -> Result<Context, TransformError> {
        self(ctx)
    }
}

/// Sends every frame straight back to the session it came from
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTransform;

impl Transform for EchoTransform {
    fn apply(&self, mut ctx: Context) -> Result<Context, TransformError> {
        let message = ctx.message.clone();
        ctx.reply(message);
        Ok(ctx)
    }
}

/// JSON routing envelope understood by [`EnvelopeTransform`]
///
/// ```json
/// {"type": "channel", "group": "lobby", "id": "5f0c...", "message": "hi"}
/// {"type": "group", "group": "lobby", "message": "hi"}
/// {"type": "broadcast", "message": "hi"}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub class: DeliveryClass,
    /// Target group; defaults to the sender's group
    #[serde(default)]
    pub group: Option<String>,
    /// Target identifier, required for `channel`
    #[serde(default)]
    pub id: Option<String>,
    /// Message body, either a string or any JSON value (re-serialized)
    pub message: serde_json::Value,
}

impl Envelope {
    fn body(&self) -> Result<Vec<u8>, TransformError> {
        match &self.message {
            serde_json::Value::String(text) => Ok(text.clone().into_bytes()),
            other => Ok(serde_json::to_vec(other)?),
        }
    }
}

/// Routes frames according to the JSON [`Envelope`] they carry
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeTransform;

impl Transform for EnvelopeTransform {
    fn apply(&self, mut ctx: Context) -> Result<Context, TransformError> {
        let envelope: Envelope = serde_json::from_slice(&ctx.message)?;
        let body = envelope.body()?;
        let group = envelope.group.unwrap_or_else(|| ctx.group.clone());

        match envelope.class {
            DeliveryClass::Unicast => {
                let id = envelope
                    .id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| TransformError::rejected("channel envelope without id"))?;
                ctx.unicast(group, id, body);
            }
            DeliveryClass::GroupCast => {
                ctx.group_cast(group, body);
            }
            DeliveryClass::Broadcast => {
                ctx.broadcast(body);
            }
        }

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Delivery;

    #[test]
    fn test_echo_replies_to_sender() {
        let ctx = Context::new("lobby", "a1", b"hello".to_vec());
        let ctx = EchoTransform.apply(ctx).unwrap();

        assert_eq!(ctx.deliveries.len(), 1);
        match &ctx.deliveries[0] {
            Delivery::Unicast { group, id, message } => {
                assert_eq!(group, "lobby");
                assert_eq!(id, "a1");
                assert_eq!(&message[..], b"hello");
            }
            other => panic!("Expected Unicast, got {:?}", other),
        }
    }

    #[test]
    fn test_closure_is_a_transform() {
        let transform = |mut ctx: Context| -> Result<Context, TransformError> {
            ctx.broadcast(b"all".to_vec());
            Ok(ctx)
        };
        let ctx = transform.apply(Context::new("g", "1", Vec::new())).unwrap();
        assert_eq!(ctx.deliveries[0].class(), DeliveryClass::Broadcast);
    }

    #[test]
    fn test_envelope_channel() {
        let frame = br#"{"type": "channel", "group": "room", "id": "b2", "message": "hi"}"#;
        let ctx = EnvelopeTransform
            .apply(Context::new("lobby", "a1", frame.to_vec()))
            .unwrap();

        assert_eq!(
            ctx.deliveries,
            vec![Delivery::Unicast {
                group: "room".to_string(),
                id: "b2".to_string(),
                message: b"hi".to_vec().into(),
            }]
        );
    }

    #[test]
    fn test_envelope_group_defaults_to_sender_group() {
        let frame = br#"{"type": "group", "message": {"score": 3}}"#;
        let ctx = EnvelopeTransform
            .apply(Context::new("lobby", "a1", frame.to_vec()))
            .unwrap();

        match &ctx.deliveries[0] {
            Delivery::GroupCast { group, message } => {
                assert_eq!(group, "lobby");
                assert_eq!(&message[..], br#"{"score":3}"#);
            }
            other => panic!("Expected GroupCast, got {:?}", other),
        }
    }

    #[test]
    fn test_envelope_broadcast() {
        let frame = br#"{"type": "broadcast", "message": "hello all"}"#;
        let ctx = EnvelopeTransform
            .apply(Context::new("lobby", "a1", frame.to_vec()))
            .unwrap();
        assert_eq!(ctx.deliveries[0].class(), DeliveryClass::Broadcast);
        assert_eq!(ctx.deliveries[0].message(), b"hello all");
    }

    #[test]
    fn test_envelope_errors() {
        let not_json = EnvelopeTransform.apply(Context::new("g", "1", b"ping".to_vec()));
        assert!(matches!(not_json, Err(TransformError::Decode(_))));

        let unknown_class = EnvelopeTransform.apply(Context::new(
            "g",
            "1",
            br#"{"type": "multicast", "message": "x"}"#.to_vec(),
        ));
        assert!(matches!(unknown_class, Err(TransformError::Decode(_))));

        let missing_id = EnvelopeTransform.apply(Context::new(
            "g",
            "1",
            br#"{"type": "channel", "message": "x"}"#.to_vec(),
        ));
        assert!(matches!(missing_id, Err(TransformError::Rejected(_))));
    }
}
