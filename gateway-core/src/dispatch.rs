//! Protocol dispatcher: classify an inbound envelope by its declared type.
//!
//! Classification only looks at the envelope; the payload of STORAGE_SYNC and
//! FILE_TRANSFER is handed through untouched so the engines can report their
//! own parse failures. The actual routing lives in `GatewayCore::dispatch`.

use serde_json::Value;

use crate::files::TransferError;
use crate::identity::PeerId;
use crate::protocol::{kind, Envelope};
use crate::storage::SyncError;

#[derive(Debug, PartialEq)]
pub enum Route<'a> {
    Connect(&'a PeerId),
    Ack(Option<&'a str>),
    StorageSync(Option<&'a Value>),
    FileTransfer(Option<&'a Value>),
    Heartbeat(&'a PeerId),
    Shutdown(Option<&'a str>),
    Unrecognized(&'a str),
}

/// What the dispatcher did with one message.
#[derive(Debug)]
pub enum Dispatched {
    /// CONNECT handled; `true` if the peer was new.
    Connected(bool),
    Acknowledged,
    StorageSynced { keys: usize },
    FilesReceived { count: usize },
    /// Heartbeat for a peer; `known` is false for ids not in the registry.
    Heartbeat { known: bool },
    /// Heartbeat carrying our own id, echoed back to the sender.
    HeartbeatEchoed,
    PeerShutdown,
    Unrecognized(String),
    /// The message was recognized but could not be applied; local state is unchanged.
    Rejected(DispatchError),
    /// The gateway is shut down; inbound traffic is ignored.
    Inactive,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0} message without id")]
    MissingId(&'static str),
    #[error(transparent)]
    Storage(#[from] SyncError),
    #[error(transparent)]
    Files(#[from] TransferError),
}

/// Classify `envelope`. CONNECT and HEARTBEAT must carry an id.
pub fn route(envelope: &Envelope) -> Result<Route<'_>, DispatchError> {
    let route = match envelope.kind.as_str() {
        kind::CONNECT => Route::Connect(
            envelope
                .id
                .as_ref()
                .ok_or(DispatchError::MissingId(kind::CONNECT))?,
        ),
        kind::ACK => Route::Ack(envelope.message.as_deref()),
        kind::STORAGE_SYNC => Route::StorageSync(envelope.data.as_ref()),
        kind::FILE_TRANSFER => Route::FileTransfer(envelope.data.as_ref()),
        kind::HEARTBEAT => Route::Heartbeat(
            envelope
                .id
                .as_ref()
                .ok_or(DispatchError::MissingId(kind::HEARTBEAT))?,
        ),
        kind::SHUTDOWN => Route::Shutdown(envelope.message.as_deref()),
        other => Route::Unrecognized(other),
    };
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(v: Value) -> Envelope {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn routes_each_type() {
        let e = env(json!({ "type": "CONNECT", "id": "p" }));
        assert_eq!(route(&e).unwrap(), Route::Connect(&PeerId::new("p")));

        let e = env(json!({ "type": "HEARTBEAT", "id": "p" }));
        assert_eq!(route(&e).unwrap(), Route::Heartbeat(&PeerId::new("p")));

        let e = env(json!({ "type": "STORAGE_SYNC", "id": "p", "data": "{}" }));
        assert!(matches!(route(&e).unwrap(), Route::StorageSync(Some(_))));

        let e = env(json!({ "type": "FILE_TRANSFER", "id": "p", "data": [] }));
        assert!(matches!(route(&e).unwrap(), Route::FileTransfer(Some(_))));

        let e = env(json!({ "type": "SHUTDOWN", "message": "bye" }));
        assert_eq!(route(&e).unwrap(), Route::Shutdown(Some("bye")));

        let e = env(json!({ "type": "ACK", "message": "ok" }));
        assert_eq!(route(&e).unwrap(), Route::Ack(Some("ok")));
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        let e = Envelope::of_kind("BOGUS");
        assert_eq!(route(&e).unwrap(), Route::Unrecognized("BOGUS"));
    }

    #[test]
    fn connect_without_id_is_an_error() {
        let e = Envelope::of_kind("CONNECT");
        assert!(matches!(route(&e), Err(DispatchError::MissingId("CONNECT"))));
    }
}
