//! Host-driven API: GatewayCore receives inbound events and ticks from the host
//! and talks back through the peer handles and collaborators it was given.

use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactSink;
use crate::bus::{InboundEvent, MessageBus, PeerHandle};
use crate::config::GatewayConfig;
use crate::dispatch::{self, DispatchError, Dispatched, Route};
use crate::env::{discovery_address, ActivationClaim, AddressBar, Environment};
use crate::error::GatewayError;
use crate::events::{EventEmitter, EventKind, GatewayEvent, SubscriptionId};
use crate::files::{self, SharedFiles};
use crate::heartbeat::HeartbeatMonitor;
use crate::identity::{PeerId, SecurityToken};
use crate::protocol::{Envelope, Message};
use crate::registry::PeerRegistry;
use crate::storage::{self, KeyValueStore};

/// Main coordinator. One per execution context.
pub struct GatewayCore<H, S, A> {
    local_id: PeerId,
    token: SecurityToken,
    config: GatewayConfig,
    claim: Option<ActivationClaim>,
    bus: MessageBus<H>,
    registry: PeerRegistry<H>,
    heartbeat: HeartbeatMonitor,
    events: EventEmitter<H>,
    store: S,
    shared_files: SharedFiles,
    sink: A,
}

impl<H, S, A> GatewayCore<H, S, A>
where
    H: PeerHandle,
    S: KeyValueStore,
    A: ArtifactSink,
{
    /// Activate a gateway in `env`. Fails with `AlreadyActive` if another gateway holds the context.
    pub fn new(
        env: &Environment,
        config: GatewayConfig,
        store: S,
        sink: A,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        let Some(claim) = env.claim() else {
            warn!(origin = env.origin(), "gateway already active in this context");
            return Err(GatewayError::AlreadyActive);
        };
        let local_id = PeerId::random();
        info!(origin = env.origin(), peer = %local_id, "gateway active");
        Ok(Self {
            local_id,
            token: SecurityToken::generate(),
            heartbeat: HeartbeatMonitor::new(config.eviction_after_missed),
            config,
            claim: Some(claim),
            bus: MessageBus::new(env.origin()),
            registry: PeerRegistry::new(),
            events: EventEmitter::new(),
            store,
            shared_files: SharedFiles::new(),
            sink,
        })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn token(&self) -> &SecurityToken {
        &self.token
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.claim.is_some()
    }

    /// Rewrite the context's address to carry the discovery marker, unless it already does.
    pub fn advertise<B: AddressBar + ?Sized>(&self, bar: &mut B) -> bool {
        match discovery_address(&bar.current(), &self.token) {
            Some(address) => {
                bar.replace(&address);
                true
            }
            None => false,
        }
    }

    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GatewayEvent<H>) -> anyhow::Result<()> + Send + 'static,
    {
        self.events.on(kind, handler)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    /// Observe every same-origin inbound message before it is dispatched.
    pub fn subscribe_inbound<F>(&mut self, handler: F)
    where
        F: FnMut(&Envelope, &H) + Send + 'static,
    {
        self.bus.subscribe(handler);
    }

    /// Announce ourselves to `target`. The remote registers us and replies with ACK.
    pub fn connect_to(&self, target: &H) {
        self.bus.send(
            target,
            &Message::Connect {
                id: self.local_id.clone(),
            },
        );
    }

    /// Process one event from the broadcast channel. `None` if it was discarded at the bus.
    pub fn on_event(&mut self, event: InboundEvent<H>) -> Option<Dispatched> {
        let (envelope, source) = self.bus.accept(event)?;
        Some(self.dispatch(&envelope, source))
    }

    /// Route one same-origin message by type.
    pub fn dispatch(&mut self, envelope: &Envelope, source: H) -> Dispatched {
        if !self.is_active() {
            debug!(kind = %envelope.kind, "gateway inactive, ignoring message");
            return Dispatched::Inactive;
        }
        let route = match dispatch::route(envelope) {
            Ok(r) => r,
            Err(e) => {
                error!(kind = %envelope.kind, error = %e, "malformed message");
                return Dispatched::Rejected(e);
            }
        };
        match route {
            Route::Connect(id) => {
                if *id == self.local_id {
                    debug!("ignoring our own CONNECT");
                    return Dispatched::Connected(false);
                }
                let added = self.registry.connect(
                    source,
                    id.clone(),
                    self.heartbeat.now(),
                    &self.bus,
                    &mut self.events,
                );
                Dispatched::Connected(added)
            }
            Route::Ack(message) => {
                debug!(peer_message = message.unwrap_or_default(), "connection acknowledged");
                Dispatched::Acknowledged
            }
            Route::StorageSync(data) => {
                let result = storage::payload_text(data).and_then(|text| {
                    storage::receive(text, &mut self.store, &mut self.sink, &mut self.events)
                });
                match result {
                    Ok(snapshot) => Dispatched::StorageSynced {
                        keys: snapshot.len(),
                    },
                    Err(e) => {
                        error!(error = %e, "failed to apply received storage");
                        Dispatched::Rejected(DispatchError::Storage(e))
                    }
                }
            }
            Route::FileTransfer(data) => {
                match files::receive(data, &mut self.shared_files, &mut self.sink, &mut self.events)
                {
                    Ok(files) => Dispatched::FilesReceived { count: files.len() },
                    Err(e) => {
                        error!(error = %e, "failed to process received files");
                        Dispatched::Rejected(DispatchError::Files(e))
                    }
                }
            }
            Route::Heartbeat(id) => {
                if *id == self.local_id {
                    self.bus.send(
                        &source,
                        &Message::Heartbeat {
                            id: self.local_id.clone(),
                        },
                    );
                    return Dispatched::HeartbeatEchoed;
                }
                let known = self.heartbeat.observe(id, &mut self.registry);
                Dispatched::Heartbeat { known }
            }
            Route::Shutdown(message) => {
                warn!(peer_message = message.unwrap_or_default(), "peer gateway shut down");
                self.events.emit(&GatewayEvent::PeerShutdown {
                    message: message.map(str::to_owned),
                });
                Dispatched::PeerShutdown
            }
            Route::Unrecognized(kind) => {
                warn!(kind, "unrecognized message type");
                Dispatched::Unrecognized(kind.to_owned())
            }
        }
    }

    /// One heartbeat period. Returns evicted peers. Does nothing once shut down.
    pub fn tick(&mut self) -> Vec<PeerId> {
        if !self.is_active() {
            return Vec::new();
        }
        self.heartbeat
            .tick(&mut self.registry, &self.bus, &mut self.events)
    }

    /// Send our whole key-value store to a connected peer.
    /// Fails with `Frame` if the snapshot does not fit in one frame; nothing is sent then.
    pub fn exchange_local_storage(&self, peer: &PeerId) -> Result<(), GatewayError> {
        let handle = self.peer_handle(peer)?;
        let msg = storage::sync_message(&self.local_id, &self.store)?;
        self.bus.try_send(handle, &msg)?;
        Ok(())
    }

    /// Send every store entry as a named file to a connected peer.
    pub fn exchange_files(&self, peer: &PeerId) -> Result<(), GatewayError> {
        let handle = self.peer_handle(peer)?;
        let msg = files::transfer_message(&self.local_id, &self.store, &self.config.file_suffix);
        self.bus.try_send(handle, &msg)?;
        Ok(())
    }

    fn peer_handle(&self, peer: &PeerId) -> Result<&H, GatewayError> {
        if !self.is_active() {
            return Err(GatewayError::Inactive);
        }
        self.registry
            .get(peer)
            .ok_or_else(|| GatewayError::UnknownPeer(peer.clone()))
    }

    pub fn remove_peer(&mut self, peer: &PeerId) -> bool {
        self.registry.remove(peer, &mut self.events)
    }

    /// Tell every peer we are leaving, forget them, release the context and emit `GatewayShutdown`.
    /// Not guarded: a second call sends nothing but emits the event again.
    pub fn shutdown(&mut self) {
        let peers = self.registry.drain();
        for (_, handle) in &peers {
            self.bus.send(handle, &Message::shutdown());
        }
        if let Some(mut claim) = self.claim.take() {
            claim.release();
        }
        info!(peers = peers.len(), "gateway shut down");
        self.events.emit(&GatewayEvent::GatewayShutdown);
    }

    pub fn peers(&self) -> impl Iterator<Item = (&PeerId, &H)> {
        self.registry.peers()
    }

    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_peer(&self, peer: &PeerId) -> bool {
        self.registry.contains(peer)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn shared_files(&self) -> &SharedFiles {
        &self.shared_files
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }
}
