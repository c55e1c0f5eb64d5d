//! Message bus adapter over the same-origin broadcast channel.
//!
//! The host owns the real channel. It wraps every received event in an
//! [`InboundEvent`] and passes it to [`MessageBus::accept`], which is the only
//! trust boundary in the system: events whose declared origin differs from the
//! local origin never reach a handler.

use tracing::{error, trace, warn};

use crate::protocol::{Envelope, Message};
use crate::wire::{decode_frame, encode_frame, FrameEncodeError};

/// Means of sending one peer a message. Non-owning: dropping a handle must not
/// close the endpoint, and posting to an endpoint that is gone is not an error.
pub trait PeerHandle: Clone + Send + 'static {
    /// Post one encoded frame. Fire-and-forget.
    fn post(&self, frame: String);
}

/// One event as delivered by the host's broadcast channel.
#[derive(Debug, Clone)]
pub struct InboundEvent<H> {
    /// Origin the event claims to come from.
    pub origin: String,
    /// Handle to reply to the sender.
    pub source: H,
    pub frame: String,
}

type InboundHandler<H> = Box<dyn FnMut(&Envelope, &H) + Send>;

pub struct MessageBus<H> {
    origin: String,
    handlers: Vec<InboundHandler<H>>,
}

impl<H: PeerHandle> MessageBus<H> {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            handlers: Vec::new(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Encode and post `msg` to `target`. Fails only if the message cannot be framed;
    /// a target that is gone is not an error.
    pub fn try_send(&self, target: &H, msg: &Message) -> Result<(), FrameEncodeError> {
        target.post(encode_frame(msg)?);
        Ok(())
    }

    /// Like [`try_send`](Self::try_send), but an encode failure is only logged.
    pub fn send(&self, target: &H, msg: &Message) {
        if let Err(e) = self.try_send(target, msg) {
            error!(kind = msg.kind(), error = %e, "failed to encode outbound message");
        }
    }

    /// Observe every accepted inbound message, in subscription order.
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&Envelope, &H) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Filter by origin, decode, and notify subscribers. Returns the decoded envelope
    /// and its source for dispatch, or `None` if the event was discarded.
    pub fn accept(&mut self, event: InboundEvent<H>) -> Option<(Envelope, H)> {
        if event.origin != self.origin {
            trace!(origin = %event.origin, "dropping cross-origin event");
            return None;
        }
        let envelope = match decode_frame(&event.frame) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return None;
            }
        };
        for handler in self.handlers.iter_mut() {
            handler(&envelope, &event.source);
        }
        Some((envelope, event.source))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Handle that records every frame posted to it.
    #[derive(Clone, Default, Debug)]
    pub struct RecordingHandle {
        pub frames: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingHandle {
        pub fn messages(&self) -> Vec<serde_json::Value> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| serde_json::from_str(f).unwrap())
                .collect()
        }

        pub fn kinds(&self) -> Vec<String> {
            self.messages()
                .into_iter()
                .map(|m| m["type"].as_str().unwrap().to_owned())
                .collect()
        }
    }

    impl PeerHandle for RecordingHandle {
        fn post(&self, frame: String) {
            self.frames.lock().unwrap().push(frame);
        }
    }

    fn event(origin: &str, frame: &str) -> InboundEvent<RecordingHandle> {
        InboundEvent {
            origin: origin.into(),
            source: RecordingHandle::default(),
            frame: frame.into(),
        }
    }

    #[test]
    fn cross_origin_never_reaches_handlers() {
        let mut bus = MessageBus::new("https://app.example");
        let seen = Arc::new(Mutex::new(0));
        let seen2 = seen.clone();
        bus.subscribe(move |_, _| *seen2.lock().unwrap() += 1);

        let out = bus.accept(event("https://evil.example", r#"{"type":"CONNECT","id":"x"}"#));
        assert!(out.is_none());
        assert_eq!(*seen.lock().unwrap(), 0);

        let out = bus.accept(event("https://app.example", r#"{"type":"CONNECT","id":"x"}"#));
        assert!(out.is_some());
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn origin_match_is_exact() {
        let mut bus: MessageBus<RecordingHandle> = MessageBus::new("https://app.example");
        assert!(bus
            .accept(event("https://app.example:443", r#"{"type":"ACK"}"#))
            .is_none());
        assert!(bus
            .accept(event("https://app.example/", r#"{"type":"ACK"}"#))
            .is_none());
    }

    #[test]
    fn undecodable_frame_is_dropped() {
        let mut bus: MessageBus<RecordingHandle> = MessageBus::new("o");
        assert!(bus.accept(event("o", "{nope")).is_none());
    }

    #[test]
    fn send_posts_encoded_frame() {
        let bus: MessageBus<RecordingHandle> = MessageBus::new("o");
        let target = RecordingHandle::default();
        bus.send(&target, &Message::ack());
        assert_eq!(target.kinds(), vec!["ACK"]);
    }

    #[test]
    fn oversized_message_is_refused_and_not_posted() {
        let bus: MessageBus<RecordingHandle> = MessageBus::new("o");
        let target = RecordingHandle::default();
        let msg = Message::Shutdown {
            message: "x".repeat(17 * 1024 * 1024),
        };
        assert!(matches!(
            bus.try_send(&target, &msg),
            Err(FrameEncodeError::TooLarge)
        ));
        bus.send(&target, &msg);
        assert!(target.frames.lock().unwrap().is_empty());
    }
}
