//! Heartbeat monitor: periodic liveness pings and optional eviction of silent peers.
//!
//! The host calls [`HeartbeatMonitor::tick`] once per heartbeat interval. Each
//! tick sends `HEARTBEAT { id: <peer id> }` to every registered peer. A peer
//! that receives a heartbeat carrying its own id echoes it back, so the sender
//! sees `HEARTBEAT { id: <that peer> }` and can record liveness for it.
//! Eviction is off unless `eviction_after_missed` is configured.

use tracing::{debug, info, trace};

use crate::bus::{MessageBus, PeerHandle};
use crate::events::EventEmitter;
use crate::identity::PeerId;
use crate::protocol::Message;
use crate::registry::PeerRegistry;

pub struct HeartbeatMonitor {
    tick_count: u64,
    eviction_after_missed: Option<u32>,
}

impl HeartbeatMonitor {
    pub fn new(eviction_after_missed: Option<u32>) -> Self {
        Self {
            tick_count: 0,
            eviction_after_missed,
        }
    }

    /// Current tick, used as the liveness clock.
    pub fn now(&self) -> u64 {
        self.tick_count
    }

    /// Advance one period: evict overdue peers (if enabled), then ping every remaining peer.
    /// Returns the evicted ids.
    pub fn tick<H: PeerHandle>(
        &mut self,
        registry: &mut PeerRegistry<H>,
        bus: &MessageBus<H>,
        events: &mut EventEmitter<H>,
    ) -> Vec<PeerId> {
        self.tick_count = self.tick_count.saturating_add(1);

        let mut evicted = Vec::new();
        if let Some(max_missed) = self.eviction_after_missed {
            for id in registry.stale(self.tick_count, u64::from(max_missed)) {
                info!(peer = %id, missed = max_missed, "evicting unresponsive peer");
                registry.remove(&id, events);
                evicted.push(id);
            }
        }

        for (id, handle) in registry.peers() {
            bus.send(handle, &Message::Heartbeat { id: id.clone() });
        }
        evicted
    }

    /// Record a heartbeat for `id`. Unknown ids are ignored. Returns true if the peer is known.
    pub fn observe<H: PeerHandle>(&self, id: &PeerId, registry: &mut PeerRegistry<H>) -> bool {
        if registry.touch(id, self.tick_count) {
            debug!(peer = %id, "peer is alive");
            true
        } else {
            trace!(peer = %id, "heartbeat for unknown peer ignored");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::tests::RecordingHandle;
    use crate::events::EventKind;
    use std::sync::{Arc, Mutex};

    fn setup() -> (
        MessageBus<RecordingHandle>,
        EventEmitter<RecordingHandle>,
        PeerRegistry<RecordingHandle>,
    ) {
        (MessageBus::new("o"), EventEmitter::new(), PeerRegistry::new())
    }

    #[test]
    fn tick_pings_every_peer_with_its_id() {
        let (bus, mut events, mut reg) = setup();
        let a = RecordingHandle::default();
        let b = RecordingHandle::default();
        reg.connect(a.clone(), "a".into(), 0, &bus, &mut events);
        reg.connect(b.clone(), "b".into(), 0, &bus, &mut events);

        let mut hb = HeartbeatMonitor::new(None);
        hb.tick(&mut reg, &bus, &mut events);

        let last_a = a.messages().pop().unwrap();
        assert_eq!(last_a["type"], "HEARTBEAT");
        assert_eq!(last_a["id"], "a");
        let last_b = b.messages().pop().unwrap();
        assert_eq!(last_b["id"], "b");
    }

    #[test]
    fn no_eviction_by_default() {
        let (bus, mut events, mut reg) = setup();
        reg.connect(RecordingHandle::default(), "a".into(), 0, &bus, &mut events);
        let mut hb = HeartbeatMonitor::new(None);
        for _ in 0..100 {
            assert!(hb.tick(&mut reg, &bus, &mut events).is_empty());
        }
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn eviction_removes_silent_peer_keeps_live_one() {
        let (bus, mut events, mut reg) = setup();
        let gone = Arc::new(Mutex::new(Vec::new()));
        let g = gone.clone();
        events.on(EventKind::PeerDisconnected, move |e| {
            if let crate::events::GatewayEvent::PeerDisconnected { id } = e {
                g.lock().unwrap().push(id.clone());
            }
            Ok(())
        });
        reg.connect(RecordingHandle::default(), "silent".into(), 0, &bus, &mut events);
        reg.connect(RecordingHandle::default(), "alive".into(), 0, &bus, &mut events);

        let mut hb = HeartbeatMonitor::new(Some(2));
        let mut evicted = Vec::new();
        for _ in 0..4 {
            evicted.extend(hb.tick(&mut reg, &bus, &mut events));
            hb.observe(&"alive".into(), &mut reg);
        }

        assert_eq!(evicted, vec![PeerId::from("silent")]);
        assert_eq!(*gone.lock().unwrap(), vec![PeerId::from("silent")]);
        assert!(reg.contains(&"alive".into()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn observe_unknown_is_ignored() {
        let (_bus, _events, mut reg) = setup();
        let hb = HeartbeatMonitor::new(Some(1));
        assert!(!hb.observe(&"ghost".into(), &mut reg));
        assert!(reg.is_empty());
    }
}
