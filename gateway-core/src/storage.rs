//! Storage sync: export the local key-value store as a snapshot, merge received snapshots.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::artifact::{Artifact, ArtifactSink, MIME_JSON};
use crate::events::{EventEmitter, GatewayEvent};
use crate::identity::PeerId;
use crate::protocol::{Message, StorageSnapshot};

/// File name of the artifact emitted for every received snapshot.
pub const SNAPSHOT_ARTIFACT_NAME: &str = "localstorage.gatewayware.dwl";

/// Local key-value persistence, addressed by key or by index.
pub trait KeyValueStore: Send {
    fn len(&self) -> usize;
    /// Key at `index` in the store's own order.
    fn key(&self, index: usize) -> Option<String>;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (key, value) pair in index order.
    fn entries(&self) -> Vec<(String, String)> {
        (0..self.len())
            .filter_map(|i| {
                let key = self.key(i)?;
                let value = self.get(&key)?;
                Some((key, value))
            })
            .collect()
    }
}

/// In-memory store ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.entries.keys().nth(index).cloned()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("storage payload missing")]
    MissingData,
    #[error("storage payload is not a string")]
    NotText,
    #[error("invalid storage snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read the entire store.
pub fn export_snapshot<S: KeyValueStore + ?Sized>(store: &S) -> StorageSnapshot {
    store.entries().into_iter().collect()
}

/// Serialize a snapshot to the JSON object text carried by STORAGE_SYNC.
pub fn encode_snapshot(snapshot: &StorageSnapshot) -> Result<String, SyncError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Parse JSON object text into a snapshot. String values are taken as-is;
/// any other value is stored as its JSON text (`5` becomes `"5"`).
pub fn decode_snapshot(encoded: &str) -> Result<StorageSnapshot, SyncError> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(encoded)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

/// Build the STORAGE_SYNC message for the current store, addressed with our id.
pub fn sync_message<S: KeyValueStore + ?Sized>(
    local_id: &PeerId,
    store: &S,
) -> Result<Message, SyncError> {
    Ok(Message::StorageSync {
        id: local_id.clone(),
        data: encode_snapshot(&export_snapshot(store))?,
    })
}

/// Extract the encoded snapshot from a STORAGE_SYNC `data` field.
pub fn payload_text(data: Option<&Value>) -> Result<&str, SyncError> {
    data.ok_or(SyncError::MissingData)?
        .as_str()
        .ok_or(SyncError::NotText)
}

/// Merge a received snapshot into the store, emit its artifact and `LocalStorageUpdated`.
/// On a parse failure nothing is written and no event is emitted.
pub fn receive<S, A, H>(
    encoded: &str,
    store: &mut S,
    sink: &mut A,
    events: &mut EventEmitter<H>,
) -> Result<StorageSnapshot, SyncError>
where
    S: KeyValueStore + ?Sized,
    A: ArtifactSink + ?Sized,
{
    let snapshot = decode_snapshot(encoded)?;
    for (key, value) in &snapshot {
        store.set(key, value);
    }
    sink.emit(Artifact {
        file_name: SNAPSHOT_ARTIFACT_NAME.to_owned(),
        mime_type: MIME_JSON,
        bytes: serde_json::to_vec_pretty(&snapshot)?,
    });
    info!(keys = snapshot.len(), "local storage updated from peer");
    events.emit(&GatewayEvent::LocalStorageUpdated(snapshot.clone()));
    Ok(snapshot)
}
