use crate::config::ConfigError;
use crate::identity::PeerId;
use crate::storage::SyncError;
use crate::wire::FrameEncodeError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("a gateway is already active in this context")]
    AlreadyActive,
    #[error("gateway is shut down")]
    Inactive,
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Frame(#[from] FrameEncodeError),
}
