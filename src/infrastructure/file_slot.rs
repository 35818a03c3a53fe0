use crate::domain::ports::HandoffSlot;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Handoff slot backed by a single file, for resuming in another process.
///
/// `put` writes through a temporary sibling and renames it into place, so a
/// reader never sees a half-written blob. `take` removes the file after
/// reading it.
#[derive(Debug, Clone)]
pub struct FileHandoffSlot {
    path: PathBuf,
}

impl FileHandoffSlot {
    /// # Arguments
    ///
    /// * `path` - The file the blob is written to. Its parent directory must exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HandoffSlot for FileHandoffSlot {
    async fn put(&self, blob: String) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn take(&self) -> Result<Option<String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        // the slot is cleared even when its contents turn out to be unreadable
        let blob = String::from_utf8(bytes).map_err(|e| EngineError::InternalError(Box::new(e)))?;
        Ok(Some(blob))
    }
}
