//! In-process broadcast network: every joined context gets an inbox, and
//! [`PeerLink`]s post frames into the target's inbox tagged with the sender's
//! origin, the way a window's `postMessage` does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use gateway_core::{InboundEvent, PeerHandle};
use tokio::sync::mpsc;
use tracing::trace;

pub type Inbox = mpsc::UnboundedReceiver<InboundEvent<PeerLink>>;

/// One joined context: its id, origin and the sending half of its inbox.
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: u64,
    origin: String,
    inbox: mpsc::UnboundedSender<InboundEvent<PeerLink>>,
}

impl Endpoint {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Directed reference from one context to another. Posting never fails:
/// if the target has gone away the frame is dropped.
#[derive(Debug, Clone)]
pub struct PeerLink {
    from: Endpoint,
    to: Endpoint,
}

impl PeerLink {
    pub fn target(&self) -> &Endpoint {
        &self.to
    }

    fn reversed(&self) -> PeerLink {
        PeerLink {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl PeerHandle for PeerLink {
    fn post(&self, frame: String) {
        let event = InboundEvent {
            origin: self.from.origin.clone(),
            source: self.reversed(),
            frame,
        };
        if self.to.inbox.send(event).is_err() {
            trace!(target_context = self.to.id, "target inbox closed, frame dropped");
        }
    }
}

#[derive(Clone, Default)]
pub struct Network {
    next_id: Arc<AtomicU64>,
    endpoints: Arc<RwLock<Vec<Endpoint>>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the network as a context with `origin`. Returns its endpoint and inbox.
    pub fn join(&self, origin: impl Into<String>) -> (Endpoint, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let endpoint = Endpoint {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            origin: origin.into(),
            inbox: tx,
        };
        if let Ok(mut eps) = self.endpoints.write() {
            eps.push(endpoint.clone());
        }
        (endpoint, rx)
    }

    /// Forget a context. Links already handed out keep posting into a closed inbox.
    pub fn leave(&self, endpoint: &Endpoint) {
        if let Ok(mut eps) = self.endpoints.write() {
            eps.retain(|e| e.id != endpoint.id);
        }
    }

    /// Links from `me` to every other joined context, whatever its origin.
    pub fn links_from(&self, me: &Endpoint) -> Vec<PeerLink> {
        let Ok(eps) = self.endpoints.read() else {
            return Vec::new();
        };
        eps.iter()
            .filter(|e| e.id != me.id)
            .map(|e| PeerLink {
                from: me.clone(),
                to: e.clone(),
            })
            .collect()
    }
}
