//! Artifacts: named payloads handed to the host's "save for the user" sink.

pub const MIME_JSON: &str = "application/json";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Receives one artifact per received snapshot and one per received file.
pub trait ArtifactSink: Send {
    fn emit(&mut self, artifact: Artifact);
}

/// Sink that keeps artifacts in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub artifacts: Vec<Artifact>,
}

impl ArtifactSink for CollectingSink {
    fn emit(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }
}
