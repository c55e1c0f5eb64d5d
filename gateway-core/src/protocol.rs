//! Gateway wire protocol: message types and payload shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::PeerId;

/// Text carried by the ACK sent back on a successful CONNECT.
pub const ACK_MESSAGE: &str = "connection accepted";

/// Text carried by the SHUTDOWN broadcast.
pub const SHUTDOWN_MESSAGE: &str = "gateway closed";

/// Full key-value state at one instant, ordered by key.
pub type StorageSnapshot = BTreeMap<String, String>;

/// Wire names of the message types.
pub mod kind {
    pub const CONNECT: &str = "CONNECT";
    pub const ACK: &str = "ACK";
    pub const STORAGE_SYNC: &str = "STORAGE_SYNC";
    pub const FILE_TRANSFER: &str = "FILE_TRANSFER";
    pub const HEARTBEAT: &str = "HEARTBEAT";
    pub const SHUTDOWN: &str = "SHUTDOWN";
}

/// A named text payload: storage key plus the file suffix, and the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferableFile {
    pub name: String,
    pub content: String,
}

/// All outbound message types. Encoding is JSON with a `type` tag (see wire module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Handshake: announce our id to a peer.
    Connect { id: PeerId },
    /// Reply to a first CONNECT.
    Ack { message: String },
    /// Serialized StorageSnapshot (JSON object text).
    StorageSync { id: PeerId, data: String },
    FileTransfer {
        id: PeerId,
        data: Vec<TransferableFile>,
    },
    /// Liveness ping, addressed with the receiving peer's id.
    Heartbeat { id: PeerId },
    Shutdown { message: String },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Connect { .. } => kind::CONNECT,
            Message::Ack { .. } => kind::ACK,
            Message::StorageSync { .. } => kind::STORAGE_SYNC,
            Message::FileTransfer { .. } => kind::FILE_TRANSFER,
            Message::Heartbeat { .. } => kind::HEARTBEAT,
            Message::Shutdown { .. } => kind::SHUTDOWN,
        }
    }

    pub fn ack() -> Self {
        Message::Ack {
            message: ACK_MESSAGE.to_owned(),
        }
    }

    pub fn shutdown() -> Self {
        Message::Shutdown {
            message: SHUTDOWN_MESSAGE.to_owned(),
        }
    }
}

/// Loosely typed inbound message. Any `type` string is accepted here so that
/// unknown types and malformed payloads can be reported by the dispatcher
/// instead of failing at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Bare envelope with only a type, for tests and synthetic traffic.
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            data: None,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_match_wire_names() {
        let msgs = [
            Message::Connect { id: "a".into() },
            Message::ack(),
            Message::StorageSync {
                id: "a".into(),
                data: "{}".into(),
            },
            Message::FileTransfer {
                id: "a".into(),
                data: vec![],
            },
            Message::Heartbeat { id: "a".into() },
            Message::shutdown(),
        ];
        for m in msgs {
            let v = serde_json::to_value(&m).unwrap();
            assert_eq!(v["type"], m.kind());
        }
    }

    #[test]
    fn file_transfer_shape() {
        let m = Message::FileTransfer {
            id: "p1".into(),
            data: vec![TransferableFile {
                name: "x.gatewayware.dwl".into(),
                content: "v".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({
                "type": "FILE_TRANSFER",
                "id": "p1",
                "data": [{ "name": "x.gatewayware.dwl", "content": "v" }]
            })
        );
    }

    #[test]
    fn envelope_accepts_unknown_type() {
        let env: Envelope = serde_json::from_value(json!({ "type": "BOGUS" })).unwrap();
        assert_eq!(env, Envelope::of_kind("BOGUS"));
    }
}
