//! File transfer: expose store entries as named files; keep and save received files.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::artifact::{Artifact, ArtifactSink, MIME_TEXT};
use crate::events::{EventEmitter, GatewayEvent};
use crate::identity::PeerId;
use crate::protocol::{Message, TransferableFile};
use crate::storage::KeyValueStore;

/// Suffix appended to a storage key to form a file name.
pub const DEFAULT_FILE_SUFFIX: &str = ".gatewayware.dwl";

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file payload missing")]
    MissingData,
    #[error("file payload is not a list")]
    NotAList,
    #[error("invalid file at index {index}: {source}")]
    InvalidFile {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Files received from peers, by name. Later files overwrite earlier ones of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedFiles {
    files: BTreeMap<String, String>,
}

impl SharedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, content: String) {
        self.files.insert(name, content);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One file per store entry, in store index order.
pub fn export_files<S: KeyValueStore + ?Sized>(store: &S, suffix: &str) -> Vec<TransferableFile> {
    store
        .entries()
        .into_iter()
        .map(|(key, content)| TransferableFile {
            name: format!("{key}{suffix}"),
            content,
        })
        .collect()
}

/// Build the FILE_TRANSFER message for the current store, addressed with our id.
pub fn transfer_message<S: KeyValueStore + ?Sized>(
    local_id: &PeerId,
    store: &S,
    suffix: &str,
) -> Message {
    Message::FileTransfer {
        id: local_id.clone(),
        data: export_files(store, suffix),
    }
}

/// Store every received file, then emit one artifact per file and `FilesReceived`.
///
/// Files are stored one at a time. If an item is malformed, processing stops;
/// files stored before it stay stored, and no artifact or event is emitted.
pub fn receive<A, H>(
    data: Option<&Value>,
    shared: &mut SharedFiles,
    sink: &mut A,
    events: &mut EventEmitter<H>,
) -> Result<Vec<TransferableFile>, TransferError>
where
    A: ArtifactSink + ?Sized,
{
    let items = data
        .ok_or(TransferError::MissingData)?
        .as_array()
        .ok_or(TransferError::NotAList)?;

    let mut files = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let file: TransferableFile = serde_json::from_value(item.clone())
            .map_err(|source| TransferError::InvalidFile { index, source })?;
        shared.insert(file.name.clone(), file.content.clone());
        files.push(file);
    }

    for file in &files {
        sink.emit(Artifact {
            file_name: file.name.clone(),
            mime_type: MIME_TEXT,
            bytes: file.content.clone().into_bytes(),
        });
    }
    info!(count = files.len(), "files received from peer");
    events.emit(&GatewayEvent::FilesReceived(files.clone()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::CollectingSink;
    use crate::events::EventKind;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn export_appends_suffix() {
        let store: MemoryStore = [("x", "v")].into_iter().collect();
        assert_eq!(
            export_files(&store, DEFAULT_FILE_SUFFIX),
            vec![TransferableFile {
                name: "x.gatewayware.dwl".into(),
                content: "v".into(),
            }]
        );
    }

    #[test]
    fn receive_stores_and_emits_one_artifact_per_file() {
        let store: MemoryStore = [("x", "v")].into_iter().collect();
        let data = serde_json::to_value(export_files(&store, DEFAULT_FILE_SUFFIX)).unwrap();

        let mut shared = SharedFiles::new();
        let mut sink = CollectingSink::default();
        let mut events: EventEmitter<()> = EventEmitter::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        events.on(EventKind::FilesReceived, move |_| {
            *h.lock().unwrap() += 1;
            Ok(())
        });

        let files = receive(Some(&data), &mut shared, &mut sink, &mut events).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(shared.get("x.gatewayware.dwl"), Some("v"));
        assert_eq!(sink.artifacts.len(), 1);
        assert_eq!(sink.artifacts[0].file_name, "x.gatewayware.dwl");
        assert_eq!(sink.artifacts[0].mime_type, MIME_TEXT);
        assert_eq!(sink.artifacts[0].bytes, b"v");
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn duplicate_names_overwrite() {
        let data = json!([
            { "name": "f", "content": "1" },
            { "name": "f", "content": "2" }
        ]);
        let mut shared = SharedFiles::new();
        let mut sink = CollectingSink::default();
        let mut events: EventEmitter<()> = EventEmitter::new();
        receive(Some(&data), &mut shared, &mut sink, &mut events).unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared.get("f"), Some("2"));
        assert_eq!(sink.artifacts.len(), 2);
    }

    #[test]
    fn bad_item_keeps_earlier_files_without_emitting() {
        let data = json!([
            { "name": "ok", "content": "1" },
            { "name": 7 },
            { "name": "never", "content": "3" }
        ]);
        let mut shared = SharedFiles::new();
        let mut sink = CollectingSink::default();
        let mut events: EventEmitter<()> = EventEmitter::new();
        let r = receive(Some(&data), &mut shared, &mut sink, &mut events);

        assert!(matches!(r, Err(TransferError::InvalidFile { index: 1, .. })));
        assert_eq!(shared.get("ok"), Some("1"));
        assert_eq!(shared.get("never"), None);
        assert!(sink.artifacts.is_empty());
    }

    #[test]
    fn non_list_payload_is_rejected() {
        let mut shared = SharedFiles::new();
        let mut sink = CollectingSink::default();
        let mut events: EventEmitter<()> = EventEmitter::new();
        let data = json!("x");
        assert!(matches!(
            receive(Some(&data), &mut shared, &mut sink, &mut events),
            Err(TransferError::NotAList)
        ));
        assert!(matches!(
            receive(None, &mut shared, &mut sink, &mut events),
            Err(TransferError::MissingData)
        ));
        assert!(shared.is_empty());
    }
}
