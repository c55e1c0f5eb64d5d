//! Peer registry: peer id -> handle, plus lifecycle events.

use std::collections::BTreeMap;

use tracing::info;

use crate::bus::{MessageBus, PeerHandle};
use crate::events::{EventEmitter, GatewayEvent};
use crate::identity::PeerId;
use crate::protocol::Message;

struct PeerEntry<H> {
    handle: H,
    /// Tick at which the peer connected or last sent a heartbeat.
    last_seen_tick: u64,
}

pub struct PeerRegistry<H> {
    peers: BTreeMap<PeerId, PeerEntry<H>>,
}

impl<H: PeerHandle> PeerRegistry<H> {
    pub fn new() -> Self {
        Self {
            peers: BTreeMap::new(),
        }
    }

    /// Register a peer, ACK it and emit `PeerConnected`. Re-announcing a known id is a no-op.
    /// Returns true if the peer was newly added.
    pub fn connect(
        &mut self,
        source: H,
        id: PeerId,
        tick: u64,
        bus: &MessageBus<H>,
        events: &mut EventEmitter<H>,
    ) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        bus.send(&source, &Message::ack());
        self.peers.insert(
            id.clone(),
            PeerEntry {
                handle: source.clone(),
                last_seen_tick: tick,
            },
        );
        info!(peer = %id, "peer connected");
        events.emit(&GatewayEvent::PeerConnected { id, source });
        true
    }

    /// Remove a peer and emit `PeerDisconnected`. No-op if absent.
    pub fn remove(&mut self, id: &PeerId, events: &mut EventEmitter<H>) -> bool {
        if self.peers.remove(id).is_none() {
            return false;
        }
        info!(peer = %id, "peer disconnected");
        events.emit(&GatewayEvent::PeerDisconnected { id: id.clone() });
        true
    }

    /// Record liveness. Returns false for unknown ids.
    pub fn touch(&mut self, id: &PeerId, tick: u64) -> bool {
        match self.peers.get_mut(id) {
            Some(entry) => {
                entry.last_seen_tick = tick;
                true
            }
            None => false,
        }
    }

    pub fn last_seen(&self, id: &PeerId) -> Option<u64> {
        self.peers.get(id).map(|e| e.last_seen_tick)
    }

    /// Peers not seen for more than `max_missed` ticks.
    pub fn stale(&self, tick: u64, max_missed: u64) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, e)| tick.saturating_sub(e.last_seen_tick) > max_missed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn peers(&self) -> impl Iterator<Item = (&PeerId, &H)> {
        self.peers.iter().map(|(id, e)| (id, &e.handle))
    }

    pub fn get(&self, id: &PeerId) -> Option<&H> {
        self.peers.get(id).map(|e| &e.handle)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Empty the table without emitting events (shutdown path).
    pub fn drain(&mut self) -> Vec<(PeerId, H)> {
        std::mem::take(&mut self.peers)
            .into_iter()
            .map(|(id, e)| (id, e.handle))
            .collect()
    }
}

impl<H: PeerHandle> Default for PeerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::tests::RecordingHandle;
    use crate::events::EventKind;
    use std::sync::{Arc, Mutex};

    fn counting(
        events: &mut EventEmitter<RecordingHandle>,
        kind: EventKind,
    ) -> Arc<Mutex<usize>> {
        let n = Arc::new(Mutex::new(0));
        let c = n.clone();
        events.on(kind, move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });
        n
    }

    #[test]
    fn connect_is_idempotent() {
        let bus = MessageBus::new("o");
        let mut events = EventEmitter::new();
        let connected = counting(&mut events, EventKind::PeerConnected);
        let mut reg = PeerRegistry::new();
        let src = RecordingHandle::default();

        assert!(reg.connect(src.clone(), "p1".into(), 0, &bus, &mut events));
        assert!(!reg.connect(src.clone(), "p1".into(), 3, &bus, &mut events));

        assert_eq!(reg.len(), 1);
        assert_eq!(*connected.lock().unwrap(), 1);
        assert_eq!(src.kinds(), vec!["ACK"]);
        assert_eq!(reg.last_seen(&"p1".into()), Some(0));
    }

    #[test]
    fn remove_exactly_one() {
        let bus = MessageBus::new("o");
        let mut events = EventEmitter::new();
        let gone = counting(&mut events, EventKind::PeerDisconnected);
        let mut reg = PeerRegistry::new();
        for id in ["a", "b", "c"] {
            reg.connect(RecordingHandle::default(), id.into(), 0, &bus, &mut events);
        }

        assert!(reg.remove(&"b".into(), &mut events));
        assert_eq!(reg.len(), 2);
        assert_eq!(*gone.lock().unwrap(), 1);

        assert!(!reg.remove(&"zzz".into(), &mut events));
        assert_eq!(reg.len(), 2);
        assert_eq!(*gone.lock().unwrap(), 1);
    }

    #[test]
    fn stale_uses_last_seen() {
        let bus = MessageBus::new("o");
        let mut events = EventEmitter::new();
        let mut reg = PeerRegistry::new();
        reg.connect(RecordingHandle::default(), "a".into(), 0, &bus, &mut events);
        reg.connect(RecordingHandle::default(), "b".into(), 0, &bus, &mut events);
        assert!(reg.touch(&"b".into(), 4));
        assert!(!reg.touch(&"nobody".into(), 4));
        assert_eq!(reg.stale(5, 3), vec![PeerId::from("a")]);
    }
}
