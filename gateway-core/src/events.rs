//! Event emitter: typed lifecycle and data events for host-side observers.

use std::collections::HashMap;

use tracing::warn;

use crate::identity::PeerId;
use crate::protocol::{StorageSnapshot, TransferableFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PeerConnected,
    PeerDisconnected,
    LocalStorageUpdated,
    FilesReceived,
    PeerShutdown,
    GatewayShutdown,
}

#[derive(Debug, Clone)]
pub enum GatewayEvent<H> {
    PeerConnected { id: PeerId, source: H },
    PeerDisconnected { id: PeerId },
    LocalStorageUpdated(StorageSnapshot),
    FilesReceived(Vec<TransferableFile>),
    /// A peer announced it is shutting down. Local notification only.
    PeerShutdown { message: Option<String> },
    GatewayShutdown,
}

impl<H> GatewayEvent<H> {
    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::PeerConnected { .. } => EventKind::PeerConnected,
            GatewayEvent::PeerDisconnected { .. } => EventKind::PeerDisconnected,
            GatewayEvent::LocalStorageUpdated(_) => EventKind::LocalStorageUpdated,
            GatewayEvent::FilesReceived(_) => EventKind::FilesReceived,
            GatewayEvent::PeerShutdown { .. } => EventKind::PeerShutdown,
            GatewayEvent::GatewayShutdown => EventKind::GatewayShutdown,
        }
    }
}

/// Token returned by [`EventEmitter::on`]; pass it to [`EventEmitter::off`] to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<H> = Box<dyn FnMut(&GatewayEvent<H>) -> anyhow::Result<()> + Send>;

pub struct EventEmitter<H> {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Handler<H>)>>,
}

impl<H> EventEmitter<H> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`. Handlers run in registration order.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GatewayEvent<H>) -> anyhow::Result<()> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove one subscription. Returns false if it was not registered.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        for list in self.handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                drop(list.remove(pos));
                return true;
            }
        }
        false
    }

    /// Invoke every handler for the event's kind, synchronously and in order.
    /// A failing handler is logged; the rest still run.
    pub fn emit(&mut self, event: &GatewayEvent<H>) {
        let kind = event.kind();
        let Some(list) = self.handlers.get_mut(&kind) else {
            return;
        };
        for (id, handler) in list.iter_mut() {
            if let Err(e) = handler(event) {
                warn!(event = ?kind, subscription = id.0, error = %e, "event handler failed");
            }
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

impl<H> Default for EventEmitter<H> {
    fn default() -> Self {
        Self::new()
    }
}
