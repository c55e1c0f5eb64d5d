//! Artifact sink that saves every artifact as a file in one directory.

use std::path::{Path, PathBuf};

use gateway_core::{Artifact, ArtifactSink};
use tracing::{error, info};

pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact names come from peers; keep only the final path component.
    fn target(&self, file_name: &str) -> Option<PathBuf> {
        let name = Path::new(file_name).file_name()?;
        Some(self.dir.join(name))
    }
}

impl ArtifactSink for DirectorySink {
    fn emit(&mut self, artifact: Artifact) {
        let Some(path) = self.target(&artifact.file_name) else {
            error!(name = %artifact.file_name, "artifact name has no file component, skipped");
            return;
        };
        let result =
            std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, &artifact.bytes));
        match result {
            Ok(()) => info!(
                path = %path.display(),
                mime = artifact.mime_type,
                bytes = artifact.bytes.len(),
                "artifact saved"
            ),
            Err(e) => error!(path = %path.display(), error = %e, "failed to save artifact"),
        }
    }
}
