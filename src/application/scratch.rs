//! Scratch-artifact lifecycle: a process-scoped temp directory holding
//! preview frames. Artifacts are allocated with randomized names, consumed
//! exactly once, and deleted unconditionally afterwards.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug)]
pub enum ScratchError {
    /// The engine never produced the artifact.
    Missing(PathBuf),
    /// The artifact exists but is zero bytes.
    Empty(PathBuf),
    Io(io::Error),
}

impl fmt::Display for ScratchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScratchError::Missing(path) => {
                write!(f, "preview artifact was not created at {:?}", path)
            }
            ScratchError::Empty(path) => {
                write!(f, "preview artifact at {:?} is empty", path)
            }
            ScratchError::Io(e) => write!(f, "preview artifact read failed: {}", e),
        }
    }
}

impl std::error::Error for ScratchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScratchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Owner of the process-scoped scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// The default process-scoped location under the system temp directory.
    pub fn new() -> Self {
        Self {
            root: std::env::temp_dir().join("karajan"),
        }
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the scratch directory if needed and hand out a randomized
    /// path inside it. Rapid repeated previews each get a distinct name.
    pub async fn allocate(&self, extension: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(self
            .root
            .join(format!("preview_{}.{}", Uuid::new_v4().simple(), extension)))
    }

    /// Read the artifact, then delete it. Deletion happens whether or not
    /// the read succeeded; a deletion failure is logged and swallowed.
    pub async fn consume_and_delete(&self, path: &Path) -> Result<Vec<u8>, ScratchError> {
        let result = match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Err(ScratchError::Empty(path.to_path_buf())),
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ScratchError::Missing(path.to_path_buf()))
            }
            Err(e) => Err(ScratchError::Io(e)),
        };

        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("failed to delete scratch artifact {:?}: {}", path, e);
            }
        }

        result
    }

    /// Remove the entire scratch directory. Called once at process
    /// shutdown; never fatal.
    pub async fn purge_all(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("failed to purge scratch directory {:?}: {}", self.root, e);
            }
        }
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::new()
    }
}
