//! Same-origin peer gateway protocol.
//! Host-driven: no I/O; the host passes inbound events and heartbeat ticks and
//! supplies the peer handles, key-value store and artifact sink.

pub mod artifact;
pub mod bus;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod events;
pub mod files;
pub mod heartbeat;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod storage;
pub mod wire;

pub use artifact::{Artifact, ArtifactSink, CollectingSink};
pub use bus::{InboundEvent, MessageBus, PeerHandle};
pub use config::{ConfigError, GatewayConfig};
pub use crate::core::GatewayCore;
pub use dispatch::{DispatchError, Dispatched};
pub use env::{AddressBar, Environment};
pub use error::GatewayError;
pub use events::{EventKind, GatewayEvent, SubscriptionId};
pub use identity::{generate_token, PeerId, SecurityToken};
pub use protocol::{Envelope, Message, StorageSnapshot, TransferableFile};
pub use storage::{KeyValueStore, MemoryStore};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};
