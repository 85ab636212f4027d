//! Temporary files owned by a single analysis job

use std::io::ErrorKind;
use std::path::Path;
use tempfile::TempPath;
use tracing::{debug, warn};

/// A staged temporary file that is deleted when dropped
///
/// Deletion is best-effort: a failure is logged and otherwise ignored, so a
/// file that cannot be removed never fails a job. A file that is already
/// gone counts as cleaned up.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<TempPath>,
    kind: &'static str,
}

impl StagedFile {
    pub(crate) fn new(path: TempPath, kind: &'static str) -> Self {
        Self {
            path: Some(path),
            kind,
        }
    }

    /// Location of the staged file
    pub fn path(&self) -> &Path {
        match &self.path {
            Some(path) => &**path,
            None => Path::new(""),
        }
    }

    /// What this file holds (`input` or `worker`)
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Delete the file now instead of at drop
    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let shown = path.display().to_string();

        match path.close() {
            Ok(()) => debug!(path = %shown, kind = self.kind, "Cleaned up temp file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %shown, kind = self.kind, "Temp file already removed")
            }
            Err(e) => warn!(
                path = %shown,
                kind = self.kind,
                error = %e,
                "Failed to delete temp file"
            ),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.remove();
    }
}
